// amqp-sampler-core/src/sampler.rs
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::ChannelManager;
use crate::client::BrokerClient;
use crate::events::{EventSink, SamplerEvent, TracingSink};
use crate::executor::{Executor, Outcome};
use crate::lifecycle::{InterruptHandle, Lifecycle, LifecycleState};
use crate::options::{Operation, SamplerOptions};
use crate::result::{codes, SampleResult};
use crate::SamplerError;

/// One sampler instance: a connection, a channel and a fixed operation.
///
/// The harness calls [`Sampler::sample`] repeatedly from a single task, then
/// [`Sampler::test_ended`] once the run is over. [`Sampler::interrupt_handle`]
/// may be used from elsewhere to stop a blocked consume early.
pub struct Sampler<C: BrokerClient> {
    options: Arc<SamplerOptions>,
    manager: ChannelManager<C>,
    executor: Executor,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
}

impl<C: BrokerClient> Sampler<C> {
    pub fn new(client: C, options: SamplerOptions) -> Self {
        Self::with_events(client, options, Arc::new(TracingSink))
    }

    pub fn with_events(client: C, options: SamplerOptions, events: Arc<dyn EventSink>) -> Self {
        let options = Arc::new(options);
        let cancel = CancellationToken::new();
        Self {
            manager: ChannelManager::new(
                client,
                Arc::clone(&options),
                Arc::clone(&events),
                cancel.clone(),
            ),
            executor: Executor::new(Arc::clone(&options), Arc::clone(&events)),
            options,
            lifecycle: Lifecycle::new(),
            cancel,
            events,
        }
    }

    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(self.cancel.clone())
    }

    /// Runs one publish or consume. Always yields exactly one result.
    pub async fn sample(&mut self) -> SampleResult {
        if self.cancel.is_cancelled() && !self.lifecycle.is_ended() {
            self.lifecycle.interrupt();
            self.end_of_test().await;
        }
        if self.lifecycle.is_ended() {
            let mut result = SampleResult::new(&self.options.label);
            result.fail(codes::SETUP_FAILED, SamplerError::Ended.to_string());
            return result;
        }
        self.lifecycle.activate();

        let Outcome {
            result,
            interrupted,
        } = match &self.options.operation {
            Operation::Consume(consume) => {
                self.executor
                    .consume_one(&mut self.manager, consume, &self.cancel)
                    .await
            }
            Operation::Publish(publish) => {
                self.executor.publish_one(&mut self.manager, publish).await
            }
        };

        if interrupted {
            self.lifecycle.interrupt();
            self.end_of_test().await;
        }
        result
    }

    /// Interrupts from the owning task: no sample can be in flight, so the
    /// end-of-test sequence runs right away.
    pub async fn interrupt(&mut self) -> bool {
        let handled = self.interrupt_handle().interrupt();
        if !self.lifecycle.is_ended() {
            self.lifecycle.interrupt();
            self.end_of_test().await;
        }
        handled
    }

    /// End-of-test teardown. Safe to call any number of times; only the first
    /// call does any work.
    pub async fn test_ended(&mut self) {
        self.end_of_test().await;
    }

    async fn end_of_test(&mut self) {
        let was_interrupted = self.lifecycle.state() == LifecycleState::Interrupted;
        if !self.lifecycle.end() {
            return;
        }
        self.cancel.cancel();

        let label = self.options.label.clone();
        if was_interrupted {
            self.events.emit(SamplerEvent::Interrupted {
                label: label.clone(),
            });
        }
        self.events.emit(SamplerEvent::TestEnded { label });
        self.manager.shutdown(self.options.purge_on_end()).await;
    }
}
