// amqp-sampler-core/src/properties.rs
//! Flat, stable-named configuration as persisted by test definitions.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::SamplerError;

/// Externally visible property names. Persisted test definitions reference
/// these, so they must never be renamed.
pub mod keys {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const VIRTUAL_HOST: &str = "virtual-host";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const TIMEOUT: &str = "timeout";
    pub const EXCHANGE: &str = "exchange";
    pub const EXCHANGE_TYPE: &str = "exchange-type";
    pub const EXCHANGE_DURABLE: &str = "exchange-durable";
    pub const QUEUE: &str = "queue";
    pub const ROUTING_KEY: &str = "routing-key";
    pub const QUEUE_DURABLE: &str = "queue-durable";
    pub const QUEUE_EXCLUSIVE: &str = "queue-exclusive";
    pub const QUEUE_AUTO_DELETE: &str = "queue-auto-delete";
    pub const MESSAGE_TTL: &str = "message-ttl";
    pub const MESSAGE_EXPIRES: &str = "message-expires";
    pub const AUTO_ACK: &str = "auto-ack";
    pub const PURGE_QUEUE: &str = "purge-queue";
    pub const MESSAGE_CONTENT: &str = "message-content";
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Loads a JSON object. Strings, booleans and numbers are accepted as
    /// values; `null` leaves the property unset.
    pub fn from_json(json: &str) -> Result<Self, SamplerError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SamplerError::Configuration(format!("invalid property file: {e}")))?;
        let Value::Object(map) = value else {
            return Err(SamplerError::Configuration(
                "property file must contain a JSON object".into(),
            ));
        };

        let mut props = Self::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::String(s) => props.insert(key, s),
                Value::Bool(b) => props.insert(key, b.to_string()),
                Value::Number(n) => props.insert(key, n.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(SamplerError::Configuration(format!(
                        "property `{key}` must be a scalar"
                    )))
                }
            }
        }
        Ok(props)
    }

    /// Parses a single `key=value` override.
    pub fn parse_assignment(raw: &str) -> Result<(String, String), SamplerError> {
        match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(SamplerError::Configuration(format!(
                "expected key=value, got `{raw}`"
            ))),
        }
    }
}
