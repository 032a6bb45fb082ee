use std::future::Future;
use std::time::Duration;

use amqp_sampler_core::options::QueueArguments;
use amqp_sampler_core::{
    BrokerChannel, BrokerClient, BrokerConnection, BrokerError, ConnectionOptions, Delivery,
    ExchangeType, MessageProperties, QueueFlags,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::*,
    types::{AMQPValue, FieldTable, LongLongInt},
    BasicProperties, Channel, Connection, Consumer, ExchangeKind,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::options::{amqp_uri, connection_properties, redacted_uri};

const REPLY_SUCCESS: u16 = 200;
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// [`BrokerClient`] backed by `lapin`.
#[derive(Clone, Debug)]
pub struct RabbitClient {
    connection_name: String,
}

impl RabbitClient {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
        }
    }
}

impl Default for RabbitClient {
    fn default() -> Self {
        Self::new("amqp-sampler")
    }
}

pub struct RabbitConnection {
    conn: Connection,
    timeout: Duration,
}

/// Every broker round trip except the consume wait is bounded by `timeout`.
pub struct RabbitChannel {
    ch: Channel,
    consumer: Mutex<Option<Consumer>>,
    timeout: Duration,
}

#[async_trait]
impl BrokerClient for RabbitClient {
    type Connection = RabbitConnection;
    type Channel = RabbitChannel;

    async fn connect(&self, opts: &ConnectionOptions) -> Result<RabbitConnection, BrokerError> {
        let uri = amqp_uri(opts);
        let connecting = Connection::connect(&uri, connection_properties(&self.connection_name));

        let conn = tokio::time::timeout(opts.timeout, connecting)
            .await
            .map_err(|_| {
                BrokerError::Connection(format!(
                    "timed out after {:?} connecting to {}",
                    opts.timeout,
                    redacted_uri(opts)
                ))
            })?
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        info!("RabbitMQ connected. uri={}", redacted_uri(opts));
        Ok(RabbitConnection {
            conn,
            timeout: opts.timeout,
        })
    }
}

#[async_trait]
impl BrokerConnection for RabbitConnection {
    type Channel = RabbitChannel;

    async fn open_channel(&self) -> Result<RabbitChannel, BrokerError> {
        let creating = async {
            self.conn
                .create_channel()
                .await
                .map_err(|e| BrokerError::Connection(e.to_string()))
        };
        let ch = within(self.timeout, "channel.open", creating).await?;
        Ok(RabbitChannel {
            ch,
            consumer: Mutex::new(None),
            timeout: self.timeout,
        })
    }

    fn is_open(&self) -> bool {
        self.conn.status().connected()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.conn
            .close(REPLY_SUCCESS, "test ended")
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }
}

#[async_trait]
impl BrokerChannel for RabbitChannel {
    fn id(&self) -> u16 {
        self.ch.id()
    }

    fn is_open(&self) -> bool {
        self.ch.status().connected()
    }

    fn close_reason(&self) -> Option<String> {
        if self.is_open() {
            None
        } else {
            Some(format!("{:?}", self.ch.status().state()))
        }
    }

    async fn declare_exchange(
        &self,
        exchange: &str,
        kind: ExchangeType,
        durable: bool,
    ) -> Result<(), BrokerError> {
        let declaring = self.ch.exchange_declare(
            exchange,
            exchange_kind(kind),
            ExchangeDeclareOptions {
                durable,
                auto_delete: false,
                internal: false,
                nowait: false,
                passive: false,
            },
            FieldTable::default(),
        );
        within(self.timeout, "exchange.declare", async {
            declaring.await.map_err(channel_error)
        })
        .await
    }

    async fn declare_queue(
        &self,
        queue: &str,
        flags: QueueFlags,
        arguments: &QueueArguments,
    ) -> Result<(), BrokerError> {
        let mut args = FieldTable::default();
        for (name, value) in arguments {
            args.insert(
                (*name).into(),
                AMQPValue::LongLongInt(LongLongInt::from(*value)),
            );
        }

        let declaring = self.ch.queue_declare(
            queue,
            QueueDeclareOptions {
                durable: flags.durable,
                exclusive: flags.exclusive,
                auto_delete: flags.auto_delete,
                nowait: false,
                passive: false,
            },
            args,
        );
        within(self.timeout, "queue.declare", async {
            declaring.await.map(|_| ()).map_err(channel_error)
        })
        .await
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let binding = self.ch.queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        );
        within(self.timeout, "queue.bind", async {
            binding.await.map_err(channel_error)
        })
        .await
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &MessageProperties,
        body: &[u8],
    ) -> Result<(), BrokerError> {
        let mut props =
            BasicProperties::default().with_content_type(properties.content_type.as_str().into());
        if properties.persistent {
            props = props.with_delivery_mode(DELIVERY_MODE_PERSISTENT);
        }

        let publishing = async move {
            self.ch
                .basic_publish(
                    exchange,
                    routing_key,
                    BasicPublishOptions {
                        mandatory: false,
                        immediate: false,
                    },
                    body,
                    props,
                )
                .await
                .map_err(channel_error)?
                .await
                .map_err(channel_error)
        };
        let confirm = within(self.timeout, "basic.publish", publishing).await?;

        if confirm.is_nack() {
            return Err(BrokerError::Channel("publisher confirm NACK".to_string()));
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<(), BrokerError> {
        let tag = format!("amqp-sampler-{}", uuid::Uuid::new_v4());
        let registering = async move {
            self.ch
                .basic_consume(
                    queue,
                    &tag,
                    BasicConsumeOptions {
                        no_ack: auto_ack,
                        exclusive: false,
                        nowait: false,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(channel_error)
        };
        let consumer = within(self.timeout, "basic.consume", registering).await?;

        debug!("Consuming queue={} tag={}", queue, consumer.tag());
        *self.consumer.lock().await = Some(consumer);
        Ok(())
    }

    async fn next_delivery(&self, timeout: Duration) -> Result<Delivery, BrokerError> {
        let mut guard = self.consumer.lock().await;
        let consumer = guard
            .as_mut()
            .ok_or_else(|| BrokerError::Channel("no consumer registered on channel".into()))?;

        match tokio::time::timeout(timeout, consumer.next()).await {
            Err(_) => Err(BrokerError::Timeout(timeout)),
            Ok(None) => Err(BrokerError::Closed("consumer stream ended".into())),
            Ok(Some(Err(e))) => Err(channel_error(e)),
            Ok(Some(Ok(d))) => Ok(Delivery {
                delivery_tag: d.delivery_tag,
                body: d.data,
                exchange: d.exchange.to_string(),
                routing_key: d.routing_key.to_string(),
                redelivered: d.redelivered,
            }),
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        let acking = self
            .ch
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false });
        within(self.timeout, "basic.ack", async {
            acking.await.map_err(channel_error)
        })
        .await
    }

    async fn purge_queue(&self, queue: &str) -> Result<u32, BrokerError> {
        self.ch
            .queue_purge(queue, QueuePurgeOptions { nowait: false })
            .await
            .map_err(channel_error)
    }
}

async fn within<T>(
    limit: Duration,
    method: &str,
    fut: impl Future<Output = Result<T, BrokerError>>,
) -> Result<T, BrokerError> {
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(BrokerError::Channel(format!(
            "{method} got no reply within {limit:?}"
        )))
    })
}

fn exchange_kind(kind: ExchangeType) -> ExchangeKind {
    match kind {
        ExchangeType::Direct => ExchangeKind::Direct,
        ExchangeType::Topic => ExchangeKind::Topic,
        ExchangeType::Headers => ExchangeKind::Headers,
        ExchangeType::Fanout => ExchangeKind::Fanout,
    }
}

/// Keeps the AMQP reply code when the broker refused a method, so the core
/// can tell configuration conflicts from connectivity problems.
fn channel_error(err: lapin::Error) -> BrokerError {
    match &err {
        lapin::Error::ProtocolError(amqp) => BrokerError::Rejected {
            code: amqp.get_id(),
            text: amqp.to_string(),
        },
        lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
            BrokerError::Closed(err.to_string())
        }
        _ => BrokerError::Channel(err.to_string()),
    }
}
