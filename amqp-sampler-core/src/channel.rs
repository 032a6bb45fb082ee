// amqp-sampler-core/src/channel.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{BrokerChannel, BrokerClient, BrokerConnection};
use crate::events::{EventSink, SamplerEvent};
use crate::options::{Operation, SamplerOptions};
use crate::topology::TopologyDeclarer;
use crate::{BrokerError, SamplerError};

struct Session<C: BrokerClient> {
    connection: C::Connection,
    channel: C::Channel,
}

/// A usable channel handed out by [`ChannelManager::ensure_channel`].
pub struct Ensured<'a, Ch> {
    pub channel: &'a Ch,
    /// True when the connection, channel and topology were just (re)built.
    pub fresh: bool,
}

/// Owns the one connection and channel of a sampler instance.
///
/// The channel is only reachable through [`ChannelManager::ensure_channel`], so
/// nothing else can hold on to a channel that has since been replaced.
pub struct ChannelManager<C: BrokerClient> {
    client: C,
    options: Arc<SamplerOptions>,
    declarer: TopologyDeclarer,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    session: Option<Session<C>>,
}

impl<C: BrokerClient> ChannelManager<C> {
    /// `cancel` aborts a connect or channel setup that is still in progress.
    pub fn new(
        client: C,
        options: Arc<SamplerOptions>,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        let declarer = TopologyDeclarer::new(options.topology.clone(), Arc::clone(&events));
        Self {
            client,
            options,
            declarer,
            events,
            cancel,
            session: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Reuses the current channel while it reports open; otherwise opens a new
    /// connection and channel and declares the topology on it.
    pub async fn ensure_channel(&mut self) -> Result<Ensured<'_, C::Channel>, SamplerError> {
        let reusable = self.session.as_ref().map(|s| s.channel.is_open());
        match reusable {
            Some(true) => {}
            Some(false) => {
                if let Some(stale) = self.session.take() {
                    self.events.emit(SamplerEvent::ChannelClosedUnexpectedly {
                        channel_id: stale.channel.id(),
                        reason: stale.channel.close_reason(),
                    });
                    self.discard(stale).await;
                }
                self.session = Some(self.rebuild().await?);
            }
            None => self.session = Some(self.rebuild().await?),
        }

        let fresh = reusable != Some(true);
        match &self.session {
            Some(s) => Ok(Ensured {
                channel: &s.channel,
                fresh,
            }),
            None => Err(SamplerError::Connectivity("no channel after rebuild".into())),
        }
    }

    /// Connects and prepares a fresh session. Both steps give way to an
    /// interrupt, and channel setup is bounded by the connection timeout.
    async fn rebuild(&self) -> Result<Session<C>, SamplerError> {
        let conn_opts = &self.options.connection;
        self.events.emit(SamplerEvent::Connecting {
            label: self.options.label.clone(),
            host: conn_opts.host.clone(),
            port: conn_opts.port,
            virtual_host: conn_opts.virtual_host.clone(),
            username: conn_opts.username.clone(),
            timeout: conn_opts.timeout,
        });

        let connection = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SamplerError::Interrupted),
            connected = self.client.connect(conn_opts) => connected?,
        };

        let limit = conn_opts.timeout;
        let prepared = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SamplerError::Interrupted),
            prepared = tokio::time::timeout(limit, self.prepare(&connection)) => {
                prepared.unwrap_or_else(|_| {
                    Err(SamplerError::Connectivity(format!(
                        "channel setup did not finish within {limit:?}"
                    )))
                })
            }
        };

        match prepared {
            Ok(channel) => Ok(Session {
                connection,
                channel,
            }),
            Err(e) => {
                if let Err(close) = bounded(limit, connection.close()).await {
                    self.events.emit(SamplerEvent::StaleConnectionCloseFailed {
                        error: close.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn prepare(&self, connection: &C::Connection) -> Result<C::Channel, SamplerError> {
        let channel = connection.open_channel().await?;
        self.declarer.declare(&channel).await?;

        if !channel.is_open() {
            let reason = channel.close_reason();
            self.events.emit(SamplerEvent::ChannelNotOpenAfterSetup {
                reason: reason.clone(),
            });
            return Err(SamplerError::Connectivity(format!(
                "channel closed right after topology declaration: {}",
                reason.as_deref().unwrap_or("unknown reason")
            )));
        }

        if let Operation::Consume(consume) = &self.options.operation {
            channel
                .consume(&self.options.topology.queue, consume.auto_ack)
                .await?;
        }
        Ok(channel)
    }

    async fn discard(&self, stale: Session<C>) {
        if !stale.connection.is_open() {
            return;
        }
        if let Err(e) = bounded(self.options.connection.timeout, stale.connection.close()).await {
            self.events.emit(SamplerEvent::StaleConnectionCloseFailed {
                error: e.to_string(),
            });
        }
    }

    /// End-of-test teardown: optional purge on the current channel, then close
    /// the connection if it is still open. Failures are reported, never returned.
    pub async fn shutdown(&mut self, purge: bool) {
        let session = self.session.take();
        let timeout = self.options.connection.timeout;
        let queue = &self.options.topology.queue;

        if purge {
            let purged = match &session {
                Some(s) => bounded(timeout, s.channel.purge_queue(queue)).await,
                None => Err(BrokerError::Closed("no channel to purge on".into())),
            };
            match purged {
                Ok(messages) => self.events.emit(SamplerEvent::QueuePurged {
                    queue: queue.clone(),
                    messages,
                }),
                Err(e) => self.events.emit(SamplerEvent::PurgeFailed {
                    queue: queue.clone(),
                    error: SamplerError::Teardown(format!("purge failed: {e}")).to_string(),
                }),
            }
        }

        let Some(session) = session else {
            return;
        };
        if !session.connection.is_open() {
            self.events.emit(SamplerEvent::ConnectionAlreadyClosed);
            return;
        }
        match bounded(timeout, session.connection.close()).await {
            Ok(()) => self.events.emit(SamplerEvent::ConnectionClosed),
            Err(e) => self.events.emit(SamplerEvent::CloseFailed {
                error: SamplerError::Teardown(format!("close failed: {e}")).to_string(),
            }),
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, BrokerError>>,
) -> Result<T, BrokerError> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(BrokerError::Timeout(limit)))
}
