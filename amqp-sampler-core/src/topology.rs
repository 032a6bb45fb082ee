// amqp-sampler-core/src/topology.rs
use std::sync::Arc;

use crate::client::BrokerChannel;
use crate::events::{EventSink, SamplerEvent};
use crate::options::TopologyOptions;
use crate::SamplerError;

/// Declares the exchange, queue and binding a sampler relies on.
///
/// Declarations are idempotent on the broker as long as the parameters match;
/// a conflicting redeclaration comes back as [`SamplerError::Configuration`]
/// and is not retried here.
pub struct TopologyDeclarer {
    topology: TopologyOptions,
    events: Arc<dyn EventSink>,
}

impl TopologyDeclarer {
    pub fn new(topology: TopologyOptions, events: Arc<dyn EventSink>) -> Self {
        Self { topology, events }
    }

    pub async fn declare<Ch: BrokerChannel + ?Sized>(&self, ch: &Ch) -> Result<(), SamplerError> {
        let t = &self.topology;
        let arguments = t.queue_arguments();

        let declared = async {
            if !t.uses_default_exchange() {
                ch.declare_exchange(&t.exchange, t.exchange_type, t.exchange_durable)
                    .await?;
            }
            ch.declare_queue(&t.queue, t.queue_flags, &arguments).await?;
            if !t.uses_default_exchange() {
                ch.bind_queue(&t.queue, &t.exchange, &t.routing_key).await?;
            }
            Ok::<_, crate::BrokerError>(())
        }
        .await;

        if let Err(e) = declared {
            let err = SamplerError::from(e);
            if let SamplerError::Configuration(msg) = &err {
                self.events.emit(SamplerEvent::ConfigurationRejected { error: msg.clone() });
            }
            return Err(err);
        }

        self.events.emit(SamplerEvent::TopologyBound {
            queue: t.queue.clone(),
            exchange: t.exchange.clone(),
            routing_key: t.routing_key.clone(),
            arguments: format!("{arguments:?}"),
        });
        Ok(())
    }
}
