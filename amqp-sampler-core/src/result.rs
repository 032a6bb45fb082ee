// amqp-sampler-core/src/result.rs
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Response codes reported to the harness.
pub mod codes {
    pub const OK: &str = "OK";
    /// The channel could not be set up; no operation was attempted.
    pub const SETUP_FAILED: &str = "500";
    /// The operation itself failed (timeout, broker error, closed channel).
    pub const OPERATION_FAILED: &str = "000";
}

/// How `response-data` is rendered in the harness record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// UTF-8 body, written as a JSON string.
    Text,
    /// Anything else, written as an array of byte values.
    Binary,
}

/// Outcome of one sample, handed to the harness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SampleResult {
    pub label: String,
    pub success: bool,
    pub response_code: String,
    pub response_message: String,
    pub sampler_data: String,
    #[serde(serialize_with = "as_text_or_bytes")]
    pub response_data: Vec<u8>,
    pub data_type: DataType,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "elapsed-ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl SampleResult {
    /// A failed setup result; callers upgrade it as the sample progresses.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: false,
            response_code: codes::SETUP_FAILED.to_string(),
            response_message: String::new(),
            sampler_data: String::new(),
            response_data: Vec::new(),
            data_type: DataType::Text,
            start_time: None,
            end_time: None,
            elapsed: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn sample_start(&mut self) {
        self.start_time = Some(Utc::now());
        self.started_at = Some(Instant::now());
    }

    pub fn sample_end(&mut self) {
        self.end_time = Some(Utc::now());
        if let Some(started) = self.started_at.take() {
            self.elapsed = started.elapsed();
        }
    }

    pub fn is_timed(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn succeed(&mut self) {
        self.success = true;
        self.response_code = codes::OK.to_string();
        self.response_message = codes::OK.to_string();
    }

    pub fn fail(&mut self, code: &str, message: impl Into<String>) {
        self.success = false;
        self.response_code = code.to_string();
        self.response_message = message.into();
    }

    /// Stores the body as response data. It is declared text unless it is
    /// not valid UTF-8.
    pub fn set_response_data(&mut self, body: &[u8]) {
        self.data_type = match std::str::from_utf8(body) {
            Ok(_) => DataType::Text,
            Err(_) => DataType::Binary,
        };
        self.response_data = body.to_vec();
    }

    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response_data).into_owned()
    }
}

fn as_text_or_bytes<S: serde::Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(data) {
        Ok(text) => s.serialize_str(text),
        Err(_) => s.collect_seq(data),
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_result_is_an_untimed_setup_failure() {
        let r = SampleResult::new("consumer");
        assert!(!r.success);
        assert_eq!(r.response_code, codes::SETUP_FAILED);
        assert!(!r.is_timed());
        assert_eq!(r.elapsed, Duration::ZERO);
    }

    #[test]
    fn timing_brackets_the_sample() {
        let mut r = SampleResult::new("consumer");
        r.sample_start();
        std::thread::sleep(Duration::from_millis(5));
        r.sample_end();

        assert!(r.elapsed >= Duration::from_millis(5));
        assert!(r.start_time.unwrap() <= r.end_time.unwrap());
    }

    #[test]
    fn serializes_with_harness_field_names() {
        let mut r = SampleResult::new("consumer");
        r.succeed();
        r.sampler_data = "hello".into();
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(json["response-code"], "OK");
        assert_eq!(json["sampler-data"], "hello");
        assert_eq!(json["data-type"], "text");
        assert_eq!(json["elapsed-ms"], 0);
    }

    #[test]
    fn response_data_is_part_of_the_record() {
        let mut r = SampleResult::new("consumer");
        r.set_response_data(b"hello");
        r.succeed();
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(r.data_type, DataType::Text);
        assert_eq!(json["response-data"], "hello");
        assert_eq!(json["data-type"], "text");
    }

    #[test]
    fn non_utf8_response_data_is_kept_as_bytes() {
        let mut r = SampleResult::new("consumer");
        r.set_response_data(&[0xff, 0x00, 0x41]);
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(r.data_type, DataType::Binary);
        assert_eq!(json["response-data"], serde_json::json!([255, 0, 65]));
        assert_eq!(json["data-type"], "binary");
    }
}
