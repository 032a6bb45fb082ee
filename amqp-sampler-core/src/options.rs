// amqp-sampler-core/src/options.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::properties::{keys, Properties};
use crate::SamplerError;

pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_VIRTUAL_HOST: &str = "/";
pub const DEFAULT_USERNAME: &str = "guest";
pub const DEFAULT_PASSWORD: &str = "guest";

/// Queue argument carrying the per-queue message TTL in milliseconds.
pub const ARG_MESSAGE_TTL: &str = "x-message-ttl";
/// Queue argument carrying the idle-queue expiry in milliseconds.
pub const ARG_EXPIRES: &str = "x-expires";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeType {
    #[default]
    Direct,
    Topic,
    Headers,
    Fanout,
}

impl ExchangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Topic => "topic",
            Self::Headers => "headers",
            Self::Fanout => "fanout",
        }
    }
}

impl FromStr for ExchangeType {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "direct" => Ok(Self::Direct),
            "topic" => Ok(Self::Topic),
            "headers" => Ok(Self::Headers),
            "fanout" => Ok(Self::Fanout),
            other => Err(SamplerError::invalid_option(
                keys::EXCHANGE_TYPE,
                format!("unknown exchange type `{other}`"),
            )),
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the broker a sampler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Consumer,
    Publisher,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub virtual_host: String,
    pub username: String,
    pub password: String,
    /// Bounds connection setup, the consume wait and teardown steps.
    pub timeout: Duration,
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("virtual_host", &self.virtual_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFlags {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl Default for QueueFlags {
    fn default() -> Self {
        Self {
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }
}

pub type QueueArguments = BTreeMap<&'static str, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyOptions {
    /// Empty selects the broker's default exchange; nothing is declared or bound then.
    pub exchange: String,
    pub exchange_type: ExchangeType,
    pub exchange_durable: bool,
    pub queue: String,
    pub routing_key: String,
    pub queue_flags: QueueFlags,
    pub message_ttl: Option<u32>,
    pub queue_expires: Option<u32>,
}

impl TopologyOptions {
    pub fn uses_default_exchange(&self) -> bool {
        self.exchange.is_empty()
    }

    /// Arguments passed with the queue declaration. TTL and expiry are only
    /// present when configured with a positive value.
    pub fn queue_arguments(&self) -> QueueArguments {
        let mut args = QueueArguments::new();
        if let Some(ttl) = self.message_ttl {
            args.insert(ARG_MESSAGE_TTL, ttl);
        }
        if let Some(expires) = self.queue_expires {
            args.insert(ARG_EXPIRES, expires);
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOptions {
    pub auto_ack: bool,
    pub purge_on_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub payload: String,
}

/// The single operation that differs between a consumer and a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Consume(ConsumeOptions),
    Publish(PublishOptions),
}

/// Resolved, validated configuration of one sampler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerOptions {
    pub label: String,
    pub connection: ConnectionOptions,
    pub topology: TopologyOptions,
    pub operation: Operation,
}

impl SamplerOptions {
    pub fn from_properties(
        label: impl Into<String>,
        role: Role,
        props: &Properties,
    ) -> Result<Self, SamplerError> {
        let host = text(props, keys::HOST, "");
        if host.is_empty() {
            return Err(SamplerError::invalid_option(keys::HOST, "must not be empty"));
        }
        let queue = text(props, keys::QUEUE, "");
        if queue.is_empty() {
            return Err(SamplerError::invalid_option(keys::QUEUE, "must not be empty"));
        }

        let connection = ConnectionOptions {
            host,
            port: positive(props, keys::PORT)
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(DEFAULT_PORT),
            virtual_host: text(props, keys::VIRTUAL_HOST, DEFAULT_VIRTUAL_HOST),
            username: text(props, keys::USERNAME, DEFAULT_USERNAME),
            password: props
                .get(keys::PASSWORD)
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            timeout: positive(props, keys::TIMEOUT)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        let topology = TopologyOptions {
            exchange: text(props, keys::EXCHANGE, ""),
            exchange_type: props
                .get(keys::EXCHANGE_TYPE)
                .unwrap_or_default()
                .parse()?,
            exchange_durable: flag(props, keys::EXCHANGE_DURABLE, true),
            queue,
            routing_key: text(props, keys::ROUTING_KEY, ""),
            queue_flags: QueueFlags {
                durable: flag(props, keys::QUEUE_DURABLE, true),
                exclusive: flag(props, keys::QUEUE_EXCLUSIVE, false),
                auto_delete: flag(props, keys::QUEUE_AUTO_DELETE, false),
            },
            message_ttl: positive(props, keys::MESSAGE_TTL).and_then(|v| u32::try_from(v).ok()),
            queue_expires: positive(props, keys::MESSAGE_EXPIRES)
                .and_then(|v| u32::try_from(v).ok()),
        };

        let operation = match role {
            Role::Consumer => Operation::Consume(ConsumeOptions {
                auto_ack: flag(props, keys::AUTO_ACK, false),
                purge_on_end: flag(props, keys::PURGE_QUEUE, false),
            }),
            Role::Publisher => Operation::Publish(PublishOptions {
                payload: props
                    .get(keys::MESSAGE_CONTENT)
                    .unwrap_or_default()
                    .to_string(),
            }),
        };

        Ok(Self {
            label: label.into(),
            connection,
            topology,
            operation,
        })
    }

    pub fn purge_on_end(&self) -> bool {
        matches!(&self.operation, Operation::Consume(c) if c.purge_on_end)
    }
}

fn text(props: &Properties, key: &str, default: &str) -> String {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn positive(props: &Properties, key: &str) -> Option<u64> {
    props
        .get(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u64)
}

/// Only a literal `true` (any case) is true; a missing or blank value takes the default.
fn flag(props: &Properties, key: &str, default: bool) -> bool {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
