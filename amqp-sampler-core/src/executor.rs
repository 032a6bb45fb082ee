// amqp-sampler-core/src/executor.rs
//! One publish or one consume against the managed channel, turned into a
//! [`SampleResult`]. Nothing in here returns an error to the caller.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::ChannelManager;
use crate::client::{BrokerChannel, BrokerClient, MessageProperties};
use crate::events::{EventSink, SamplerEvent};
use crate::options::{ConsumeOptions, PublishOptions, SamplerOptions};
use crate::result::{codes, SampleResult};
use crate::SamplerError;

pub(crate) struct Outcome {
    pub result: SampleResult,
    /// The consume wait was cut short by an interrupt.
    pub interrupted: bool,
}

pub(crate) struct Executor {
    options: Arc<SamplerOptions>,
    events: Arc<dyn EventSink>,
}

impl Executor {
    pub fn new(options: Arc<SamplerOptions>, events: Arc<dyn EventSink>) -> Self {
        Self { options, events }
    }

    pub async fn consume_one<C: BrokerClient>(
        &self,
        manager: &mut ChannelManager<C>,
        consume: &ConsumeOptions,
        cancel: &CancellationToken,
    ) -> Outcome {
        let mut result = SampleResult::new(&self.options.label);

        let channel = match manager.ensure_channel().await {
            Ok(ensured) => ensured.channel,
            Err(e) => return self.setup_failed(result, e),
        };

        result.sample_start();
        let timeout = self.options.connection.timeout;
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SamplerError::Interrupted),
            delivery = channel.next_delivery(timeout) => delivery.map_err(SamplerError::from),
        };
        let interrupted = matches!(received, Err(SamplerError::Interrupted));

        match received {
            Ok(delivery) => {
                result.sampler_data = String::from_utf8_lossy(&delivery.body).into_owned();
                result.set_response_data(&delivery.body);
                result.succeed();

                if !consume.auto_ack {
                    if let Err(e) = channel.ack(delivery.delivery_tag).await {
                        self.operation_failed(
                            &mut result,
                            SamplerError::Operation(format!(
                                "ack of delivery {} failed: {e}",
                                delivery.delivery_tag
                            )),
                        );
                    }
                }
            }
            Err(e) => self.operation_failed(&mut result, e),
        }

        result.sample_end();
        Outcome {
            result,
            interrupted,
        }
    }

    pub async fn publish_one<C: BrokerClient>(
        &self,
        manager: &mut ChannelManager<C>,
        publish: &PublishOptions,
    ) -> Outcome {
        let mut result = SampleResult::new(&self.options.label);

        let channel = match manager.ensure_channel().await {
            Ok(ensured) => ensured.channel,
            Err(e) => return self.setup_failed(result, e),
        };

        let topology = &self.options.topology;
        let routing_key = if topology.uses_default_exchange() {
            topology.queue.as_str()
        } else {
            topology.routing_key.as_str()
        };

        result.sample_start();
        result.sampler_data = publish.payload.clone();
        let published = channel
            .publish(
                &topology.exchange,
                routing_key,
                &MessageProperties::persistent_text_plain(),
                publish.payload.as_bytes(),
            )
            .await;
        match published {
            Ok(()) => result.succeed(),
            Err(e) => self.operation_failed(&mut result, e.into()),
        }
        result.sample_end();

        Outcome {
            result,
            interrupted: false,
        }
    }

    fn setup_failed(&self, mut result: SampleResult, err: SamplerError) -> Outcome {
        let interrupted = matches!(err, SamplerError::Interrupted);
        if !interrupted && !matches!(err, SamplerError::Configuration(_)) {
            self.events.emit(SamplerEvent::SetupFailed {
                error: err.to_string(),
            });
        }
        result.fail(codes::SETUP_FAILED, err.to_string());
        Outcome {
            result,
            interrupted,
        }
    }

    fn operation_failed(&self, result: &mut SampleResult, err: SamplerError) {
        self.events.emit(SamplerEvent::OperationFailed {
            error: err.to_string(),
        });
        result.fail(codes::OPERATION_FAILED, err.to_string());
    }
}
