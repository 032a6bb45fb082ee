// amqp-sampler-core/src/error.rs
use std::time::Duration;
use thiserror::Error;

/// AMQP reply code: the client lacks permission, or an exclusive queue is held elsewhere.
pub const REPLY_ACCESS_REFUSED: u16 = 403;
/// AMQP reply code: the resource is locked by another connection.
pub const REPLY_RESOURCE_LOCKED: u16 = 405;
/// AMQP reply code: redeclaration with arguments that differ from the existing resource.
pub const REPLY_PRECONDITION_FAILED: u16 = 406;

/// Errors reported by a broker client implementation.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("broker rejected request ({code}): {text}")]
    Rejected { code: u16, text: String },

    #[error("no message received within {0:?}")]
    Timeout(Duration),

    #[error("closed: {0}")]
    Closed(String),
}

/// Errors surfaced by the sampler core.
#[derive(Debug, Clone, Error)]
pub enum SamplerError {
    #[error("invalid option `{key}`: {reason}")]
    InvalidOption { key: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("timed out after {0:?} waiting for a message")]
    Timeout(Duration),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("teardown error: {0}")]
    Teardown(String),

    #[error("interrupted")]
    Interrupted,

    #[error("sampler has ended")]
    Ended,
}

impl SamplerError {
    pub fn invalid_option(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key,
            reason: reason.into(),
        }
    }
}

impl From<BrokerError> for SamplerError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Rejected { code, .. }
                if matches!(
                    code,
                    REPLY_ACCESS_REFUSED | REPLY_RESOURCE_LOCKED | REPLY_PRECONDITION_FAILED
                ) =>
            {
                SamplerError::Configuration(err.to_string())
            }
            BrokerError::Timeout(after) => SamplerError::Timeout(after),
            other => SamplerError::Connectivity(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failed_is_a_configuration_error() {
        let err = SamplerError::from(BrokerError::Rejected {
            code: REPLY_PRECONDITION_FAILED,
            text: "inequivalent arg 'durable' for queue 'q1'".into(),
        });
        assert!(matches!(err, SamplerError::Configuration(_)));
        assert!(err.to_string().contains("durable"));
    }

    #[test]
    fn other_rejections_are_connectivity_errors() {
        let err = SamplerError::from(BrokerError::Rejected {
            code: 320,
            text: "connection forced".into(),
        });
        assert!(matches!(err, SamplerError::Connectivity(_)));
    }

    #[test]
    fn broker_timeout_keeps_its_duration() {
        let err = SamplerError::from(BrokerError::Timeout(Duration::from_millis(250)));
        assert!(matches!(err, SamplerError::Timeout(d) if d == Duration::from_millis(250)));
    }
}
