// amqp-sampler-core/src/client.rs
//! Broker capabilities the sampler core drives. The RabbitMQ crate implements
//! these over a real AMQP client; tests use an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;

use crate::options::{ConnectionOptions, ExchangeType, QueueArguments, QueueFlags};
use crate::BrokerError;

/// One message handed out by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
}

/// Properties attached to a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    pub persistent: bool,
    pub content_type: String,
}

impl MessageProperties {
    pub fn persistent_text_plain() -> Self {
        Self {
            persistent: true,
            content_type: "text/plain".into(),
        }
    }
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    type Connection: BrokerConnection<Channel = Self::Channel>;
    type Channel: BrokerChannel;

    async fn connect(&self, options: &ConnectionOptions) -> Result<Self::Connection, BrokerError>;
}

#[async_trait]
pub trait BrokerConnection: Send + Sync {
    type Channel: BrokerChannel;

    async fn open_channel(&self) -> Result<Self::Channel, BrokerError>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn id(&self) -> u16;

    fn is_open(&self) -> bool;

    /// Broker-reported reason for the channel being closed, if known.
    fn close_reason(&self) -> Option<String>;

    async fn declare_exchange(
        &self,
        exchange: &str,
        kind: ExchangeType,
        durable: bool,
    ) -> Result<(), BrokerError>;

    async fn declare_queue(
        &self,
        queue: &str,
        flags: QueueFlags,
        arguments: &QueueArguments,
    ) -> Result<(), BrokerError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &MessageProperties,
        body: &[u8],
    ) -> Result<(), BrokerError>;

    /// Registers a subscription on `queue` whose deliveries are handed out
    /// by [`BrokerChannel::next_delivery`].
    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<(), BrokerError>;

    /// Waits up to `timeout` for the next delivery of the registered
    /// subscription, failing with [`BrokerError::Timeout`] when none arrives.
    async fn next_delivery(&self, timeout: Duration) -> Result<Delivery, BrokerError>;

    /// Acknowledges exactly one delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Returns the number of messages removed.
    async fn purge_queue(&self, queue: &str) -> Result<u32, BrokerError>;
}
