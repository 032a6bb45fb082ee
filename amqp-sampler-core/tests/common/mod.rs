#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amqp_sampler_core::options::QueueArguments;
use amqp_sampler_core::{
    keys, BrokerChannel, BrokerClient, BrokerConnection, BrokerError, ConnectionOptions,
    Delivery, ExchangeType, MessageProperties, Properties, QueueFlags, Role, SamplerOptions,
};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub connects: usize,
    pub channels: usize,
    pub exchange_declares: Vec<(String, ExchangeType, bool)>,
    pub queue_declares: Vec<(String, QueueFlags, QueueArguments)>,
    pub binds: Vec<(String, String, String)>,
    pub consumes: Vec<(String, bool)>,
    pub publishes: Vec<(String, String, MessageProperties, Vec<u8>)>,
    pub acks: Vec<u64>,
    pub purges: usize,
    pub closes: usize,
}

#[derive(Default)]
struct State {
    calls: Calls,
    queue: VecDeque<Vec<u8>>,
    next_tag: u64,
    fail_connects: usize,
    reject_queue_declare: Option<u16>,
    close_after_declare: bool,
    close_on_next_wait: bool,
    fail_publishes: usize,
    fail_closes: usize,
    stall_queue_declare: bool,
    connections: Vec<Arc<AtomicBool>>,
    channels: Vec<Arc<AtomicBool>>,
}

/// Scripted in-memory broker with call counters.
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<State>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn push_message(&self, body: &[u8]) {
        self.state.lock().unwrap().queue.push_back(body.to_vec());
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().unwrap().fail_connects = n;
    }

    pub fn reject_queue_declare(&self, code: u16) {
        self.state.lock().unwrap().reject_queue_declare = Some(code);
    }

    pub fn close_channel_after_declare(&self) {
        self.state.lock().unwrap().close_after_declare = true;
    }

    pub fn close_channel_on_next_wait(&self) {
        self.state.lock().unwrap().close_on_next_wait = true;
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.state.lock().unwrap().fail_publishes = n;
    }

    pub fn fail_next_closes(&self, n: usize) {
        self.state.lock().unwrap().fail_closes = n;
    }

    /// Queue declarations never get a reply, as with a wedged broker.
    pub fn stall_queue_declare(&self) {
        self.state.lock().unwrap().stall_queue_declare = true;
    }

    /// Closes the most recently opened channel, as a broker-side error would.
    pub fn close_current_channel(&self) {
        if let Some(ch) = self.state.lock().unwrap().channels.last() {
            ch.store(false, Ordering::SeqCst);
        }
    }

    /// Drops the most recent connection and, with it, its channels.
    pub fn close_current_connection(&self) {
        let state = self.state.lock().unwrap();
        if let Some(conn) = state.connections.last() {
            conn.store(false, Ordering::SeqCst);
        }
        if let Some(ch) = state.channels.last() {
            ch.store(false, Ordering::SeqCst);
        }
    }
}

pub struct FakeConnection {
    broker: FakeBroker,
    open: Arc<AtomicBool>,
}

pub struct FakeChannel {
    broker: FakeBroker,
    id: u16,
    open: Arc<AtomicBool>,
    connection_open: Arc<AtomicBool>,
}

impl FakeChannel {
    fn check_open(&self) -> Result<(), BrokerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BrokerError::Closed(format!("channel {} is closed", self.id)))
        }
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    type Connection = FakeConnection;
    type Channel = FakeChannel;

    async fn connect(&self, _options: &ConnectionOptions) -> Result<FakeConnection, BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.connects += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(BrokerError::Connection("connection refused".into()));
        }
        let open = Arc::new(AtomicBool::new(true));
        state.connections.push(Arc::clone(&open));
        Ok(FakeConnection {
            broker: self.clone(),
            open,
        })
    }
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    type Channel = FakeChannel;

    async fn open_channel(&self) -> Result<FakeChannel, BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::Connection("connection is closed".into()));
        }
        let mut state = self.broker.state.lock().unwrap();
        state.calls.channels += 1;
        let open = Arc::new(AtomicBool::new(true));
        state.channels.push(Arc::clone(&open));
        Ok(FakeChannel {
            broker: self.broker.clone(),
            id: state.calls.channels as u16,
            open,
            connection_open: Arc::clone(&self.open),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.closes += 1;
        if state.fail_closes > 0 {
            state.fail_closes -= 1;
            return Err(BrokerError::Connection("close-ok never arrived".into()));
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for FakeChannel {
    fn id(&self) -> u16 {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.connection_open.load(Ordering::SeqCst)
    }

    fn close_reason(&self) -> Option<String> {
        (!self.is_open()).then(|| "CHANNEL_ERROR - forced by test".to_string())
    }

    async fn declare_exchange(
        &self,
        exchange: &str,
        kind: ExchangeType,
        durable: bool,
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.state.lock().unwrap();
        state
            .calls
            .exchange_declares
            .push((exchange.to_string(), kind, durable));
        Ok(())
    }

    async fn declare_queue(
        &self,
        queue: &str,
        flags: QueueFlags,
        arguments: &QueueArguments,
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let stall = {
            let mut state = self.broker.state.lock().unwrap();
            state
                .calls
                .queue_declares
                .push((queue.to_string(), flags, arguments.clone()));
            if let Some(code) = state.reject_queue_declare {
                self.open.store(false, Ordering::SeqCst);
                return Err(BrokerError::Rejected {
                    code,
                    text: format!(
                        "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{queue}'"
                    ),
                });
            }
            state.stall_queue_declare
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.state.lock().unwrap();
        state.calls.binds.push((
            queue.to_string(),
            exchange.to_string(),
            routing_key.to_string(),
        ));
        if state.close_after_declare {
            self.open.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &MessageProperties,
        body: &[u8],
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.state.lock().unwrap();
        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            self.open.store(false, Ordering::SeqCst);
            return Err(BrokerError::Channel("NOT_FOUND - no exchange".into()));
        }
        state.calls.publishes.push((
            exchange.to_string(),
            routing_key.to_string(),
            properties.clone(),
            body.to_vec(),
        ));
        Ok(())
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<(), BrokerError> {
        self.check_open()?;
        self.broker
            .state
            .lock()
            .unwrap()
            .calls
            .consumes
            .push((queue.to_string(), auto_ack));
        Ok(())
    }

    async fn next_delivery(&self, timeout: Duration) -> Result<Delivery, BrokerError> {
        self.check_open()?;
        {
            let mut state = self.broker.state.lock().unwrap();
            if state.close_on_next_wait {
                state.close_on_next_wait = false;
                self.open.store(false, Ordering::SeqCst);
                return Err(BrokerError::Closed("channel closed while waiting".into()));
            }
            if let Some(body) = state.queue.pop_front() {
                state.next_tag += 1;
                return Ok(Delivery {
                    delivery_tag: state.next_tag,
                    body,
                    exchange: "e1".into(),
                    routing_key: "rk1".into(),
                    redelivered: false,
                });
            }
        }
        tokio::time::sleep(timeout).await;
        Err(BrokerError::Timeout(timeout))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.check_open()?;
        self.broker.state.lock().unwrap().calls.acks.push(delivery_tag);
        Ok(())
    }

    async fn purge_queue(&self, _queue: &str) -> Result<u32, BrokerError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.purges += 1;
        if !self.is_open() {
            return Err(BrokerError::Closed("channel is closed".into()));
        }
        let purged = state.queue.len() as u32;
        state.queue.clear();
        Ok(purged)
    }
}

pub fn properties() -> Properties {
    Properties::new()
        .set(keys::HOST, "localhost")
        .set(keys::PORT, "5672")
        .set(keys::QUEUE, "q1")
        .set(keys::EXCHANGE, "e1")
        .set(keys::ROUTING_KEY, "rk1")
        .set(keys::TIMEOUT, "1000")
}

pub fn consumer_options(props: &Properties) -> SamplerOptions {
    SamplerOptions::from_properties("AMQP Consumer", Role::Consumer, props).unwrap()
}

pub fn publisher_options(props: &Properties) -> SamplerOptions {
    SamplerOptions::from_properties("AMQP Publisher", Role::Publisher, props).unwrap()
}
