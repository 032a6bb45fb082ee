// amqp-sampler-core/src/events.rs
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// Notable things that happen inside one sampler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerEvent {
    Connecting {
        label: String,
        host: String,
        port: u16,
        virtual_host: String,
        username: String,
        timeout: Duration,
    },
    ChannelClosedUnexpectedly {
        channel_id: u16,
        reason: Option<String>,
    },
    TopologyBound {
        queue: String,
        exchange: String,
        routing_key: String,
        arguments: String,
    },
    ChannelNotOpenAfterSetup {
        reason: Option<String>,
    },
    SetupFailed {
        error: String,
    },
    ConfigurationRejected {
        error: String,
    },
    OperationFailed {
        error: String,
    },
    StaleConnectionCloseFailed {
        error: String,
    },
    Interrupted {
        label: String,
    },
    TestEnded {
        label: String,
    },
    QueuePurged {
        queue: String,
        messages: u32,
    },
    PurgeFailed {
        queue: String,
        error: String,
    },
    ConnectionClosed,
    ConnectionAlreadyClosed,
    CloseFailed {
        error: String,
    },
}

/// Receives sampler events. Injected into every component so tests can
/// observe which paths were exercised.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SamplerEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SamplerEvent) {
        match event {
            SamplerEvent::Connecting {
                label,
                host,
                port,
                virtual_host,
                username,
                timeout,
            } => info!(
                %label, %host, port, %virtual_host, %username, ?timeout,
                "opening AMQP connection"
            ),
            SamplerEvent::ChannelClosedUnexpectedly { channel_id, reason } => warn!(
                channel_id,
                reason = reason.as_deref().unwrap_or("unknown"),
                "channel closed unexpectedly"
            ),
            SamplerEvent::TopologyBound {
                queue,
                exchange,
                routing_key,
                arguments,
            } => info!(%queue, %exchange, %routing_key, %arguments, "bound queue"),
            SamplerEvent::ChannelNotOpenAfterSetup { reason } => error!(
                reason = reason.as_deref().unwrap_or("unknown"),
                "failed to open channel: closed right after topology declaration"
            ),
            SamplerEvent::SetupFailed { error } => {
                error!(%error, "failed to initialize channel")
            }
            SamplerEvent::ConfigurationRejected { error } => {
                error!(%error, "broker rejected topology; check exchange/queue settings")
            }
            SamplerEvent::OperationFailed { error } => debug!(%error, "sample failed"),
            SamplerEvent::StaleConnectionCloseFailed { error } => {
                debug!(%error, "failed to close stale connection")
            }
            SamplerEvent::Interrupted { label } => info!(%label, "sampler interrupted"),
            SamplerEvent::TestEnded { label } => info!(%label, "test ended"),
            SamplerEvent::QueuePurged { queue, messages } => {
                info!(%queue, messages, "purged queue")
            }
            SamplerEvent::PurgeFailed { queue, error } => {
                error!(%queue, %error, "failed to purge queue")
            }
            SamplerEvent::ConnectionClosed => debug!("connection closed"),
            SamplerEvent::ConnectionAlreadyClosed => debug!("connection already closed"),
            SamplerEvent::CloseFailed { error } => error!(%error, "failed to close connection"),
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SamplerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SamplerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, pred: impl Fn(&SamplerEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SamplerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
