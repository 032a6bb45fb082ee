//! Connection lifecycle and consume/publish sampling for AMQP load tests.
//!
//! A [`Sampler`] owns one broker connection and one channel, declares its
//! topology on first use, rebuilds everything when the channel is found
//! closed, and converts every outcome into a [`SampleResult`].

pub mod channel;
pub mod client;
pub mod error;
pub mod events;
mod executor;
pub mod lifecycle;
pub mod options;
pub mod properties;
pub mod result;
pub mod sampler;
pub mod topology;

pub use channel::{ChannelManager, Ensured};
pub use client::{BrokerChannel, BrokerClient, BrokerConnection, Delivery, MessageProperties};
pub use error::{BrokerError, SamplerError};
pub use events::{EventSink, RecordingSink, SamplerEvent, TracingSink};
pub use lifecycle::{InterruptHandle, LifecycleState};
pub use options::{
    ConnectionOptions, ConsumeOptions, ExchangeType, Operation, PublishOptions, QueueFlags, Role,
    SamplerOptions, TopologyOptions,
};
pub use properties::{keys, Properties};
pub use result::{codes, DataType, SampleResult};
pub use sampler::Sampler;
pub use topology::TopologyDeclarer;
