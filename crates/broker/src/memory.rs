//! In-process broker transport with simulated outages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{BrokerConnection, BrokerTransport, Delivery};
use crate::{BrokerError, Result, WireMessage};

/// In-memory broker transport for tests and local development.
///
/// Each `(topic, subscription_id)` pair is one consumer group receiving one
/// copy of every message published to the topic. Outages are simulated with
/// [`fail_next_connects`](Self::fail_next_connects), [`set_down`](Self::set_down)
/// and [`restart`](Self::restart).
///
/// Accepted messages are kept in a bounded log for inspection; once it holds
/// [`DEFAULT_PUBLISH_LOG_CAPACITY`] messages the oldest are evicted.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    next_connection_id: Arc<AtomicU64>,
}

/// Messages retained by [`InMemoryBroker::new`] for inspection.
pub const DEFAULT_PUBLISH_LOG_CAPACITY: usize = 1024;

struct BrokerState {
    down: bool,
    failures_remaining: u32,
    connect_attempts: u32,
    generation: u64,
    topics: HashMap<String, Vec<ConsumerGroup>>,
    published: VecDeque<WireMessage>,
    publish_log_capacity: usize,
}

impl BrokerState {
    fn record(&mut self, message: WireMessage) {
        if self.publish_log_capacity == 0 {
            return;
        }
        if self.published.len() == self.publish_log_capacity {
            self.published.pop_front();
        }
        self.published.push_back(message);
    }
}

struct ConsumerGroup {
    subscription_id: String,
    owner: u64,
    sender: mpsc::UnboundedSender<WireMessage>,
}

impl InMemoryBroker {
    /// Creates a new broker that accepts connections.
    pub fn new() -> Self {
        Self::with_publish_log_capacity(DEFAULT_PUBLISH_LOG_CAPACITY)
    }

    /// Creates a broker retaining at most `capacity` accepted messages.
    /// Zero disables the publish log.
    pub fn with_publish_log_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                down: false,
                failures_remaining: 0,
                connect_attempts: 0,
                generation: 0,
                topics: HashMap::new(),
                published: VecDeque::with_capacity(capacity.min(DEFAULT_PUBLISH_LOG_CAPACITY)),
                publish_log_capacity: capacity,
            })),
            next_connection_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    /// Takes the broker down (dropping every session) or brings it back up.
    pub fn set_down(&self, down: bool) {
        let mut state = self.lock();
        if down && !state.down {
            Self::drop_sessions(&mut state);
        }
        state.down = down;
    }

    /// Simulates a broker restart: every open connection and subscription is lost.
    pub fn restart(&self) {
        Self::drop_sessions(&mut self.lock());
    }

    /// Returns the number of connection attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Returns the retained accepted messages, in publish order.
    pub fn published(&self) -> Vec<WireMessage> {
        self.lock().published.iter().cloned().collect()
    }

    /// Returns retained messages accepted on a topic, in publish order.
    pub fn published_to(&self, topic: &str) -> Vec<WireMessage> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Returns the number of consumer groups registered on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drop_sessions(state: &mut BrokerState) {
        state.generation += 1;
        // dropping the senders ends every delivery stream
        state.topics.clear();
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn connect(&self, _connection_string: &str) -> Result<Arc<dyn BrokerConnection>> {
        let mut state = self.lock();
        state.connect_attempts += 1;

        if state.down {
            return Err(BrokerError::Transport("connection refused".to_string()));
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(BrokerError::Transport("connection refused".to_string()));
        }

        Ok(Arc::new(InMemoryConnection {
            id: self.next_connection_id.fetch_add(1, Ordering::SeqCst),
            generation: state.generation,
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryConnection {
    id: u64,
    generation: u64,
    state: Arc<Mutex<BrokerState>>,
    closed: AtomicBool,
}

impl InMemoryConnection {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_state(&self) -> Result<MutexGuard<'_, BrokerState>> {
        let state = self.lock();
        if self.closed.load(Ordering::SeqCst) || state.generation != self.generation {
            return Err(BrokerError::ConnectionClosed);
        }
        Ok(state)
    }
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    fn is_open(&self) -> bool {
        self.open_state().is_ok()
    }

    async fn publish(&self, message: WireMessage) -> Result<()> {
        let mut state = self.open_state()?;

        if let Some(groups) = state.topics.get_mut(&message.topic) {
            groups.retain(|group| group.sender.send(message.clone()).is_ok());
        }
        state.record(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, subscription_id: &str) -> Result<Delivery> {
        let mut state = self.open_state()?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let groups = state.topics.entry(topic.to_string()).or_default();
        match groups
            .iter_mut()
            .find(|group| group.subscription_id == subscription_id)
        {
            Some(existing) => {
                existing.sender = sender;
                existing.owner = self.id;
            }
            None => groups.push(ConsumerGroup {
                subscription_id: subscription_id.to_string(),
                owner: self.id,
                sender,
            }),
        }

        Ok(receiver)
    }

    async fn unsubscribe(&self, topic: &str, subscription_id: &str) -> Result<()> {
        let mut state = self.open_state()?;
        if let Some(groups) = state.topics.get_mut(topic) {
            groups.retain(|group| group.subscription_id != subscription_id);
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock();
        for groups in state.topics.values_mut() {
            groups.retain(|group| group.owner != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> WireMessage {
        WireMessage::builder()
            .topic(topic)
            .payload_raw(serde_json::json!({"n": 1}))
            .try_build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_each_group_receives_one_copy() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("mem").await.unwrap();

        let mut a = connection.subscribe("t", "a").await.unwrap();
        let mut b = connection.subscribe("t", "b").await.unwrap();
        connection.publish(message("t")).await.unwrap();

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
        assert!(a.try_recv().is_err());
        assert_eq!(broker.published_to("t").len(), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_group() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("mem").await.unwrap();

        let mut old = connection.subscribe("t", "a").await.unwrap();
        let mut new = connection.subscribe("t", "a").await.unwrap();
        connection.publish(message("t")).await.unwrap();

        assert_eq!(broker.subscriber_count("t"), 1);
        assert!(old.recv().await.is_none());
        assert!(new.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_restart_invalidates_connections_and_deliveries() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("mem").await.unwrap();
        let mut delivery = connection.subscribe("t", "a").await.unwrap();

        broker.restart();

        assert!(!connection.is_open());
        assert!(delivery.recv().await.is_none());
        assert!(matches!(
            connection.publish(message("t")).await,
            Err(BrokerError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_drops_own_subscriptions_only() {
        let broker = InMemoryBroker::new();
        let first = broker.connect("mem").await.unwrap();
        let second = broker.connect("mem").await.unwrap();
        first.subscribe("t", "a").await.unwrap();
        second.subscribe("t", "b").await.unwrap();

        first.close().await;

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(broker.subscriber_count("t"), 1);
    }

    #[tokio::test]
    async fn test_publish_log_keeps_only_the_newest_messages() {
        let broker = InMemoryBroker::with_publish_log_capacity(3);
        let connection = broker.connect("mem").await.unwrap();
        let mut delivery = connection.subscribe("t", "a").await.unwrap();

        for topic in ["t", "t", "u", "t", "u"] {
            connection.publish(message(topic)).await.unwrap();
        }

        let retained: Vec<String> = broker.published().into_iter().map(|m| m.topic).collect();
        assert_eq!(retained, vec!["u", "t", "u"]);
        assert_eq!(broker.published_to("t").len(), 1);
        // delivery is unaffected by the log bound
        for _ in 0..3 {
            assert!(delivery.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn test_default_publish_log_is_bounded() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("mem").await.unwrap();

        for _ in 0..DEFAULT_PUBLISH_LOG_CAPACITY + 10 {
            connection.publish(message("t")).await.unwrap();
        }

        assert_eq!(broker.published().len(), DEFAULT_PUBLISH_LOG_CAPACITY);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_publish_log() {
        let broker = InMemoryBroker::with_publish_log_capacity(0);
        let connection = broker.connect("mem").await.unwrap();

        connection.publish(message("t")).await.unwrap();

        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_connects() {
        let broker = InMemoryBroker::new();
        broker.fail_next_connects(1);

        assert!(broker.connect("mem").await.is_err());
        assert!(broker.connect("mem").await.is_ok());
        assert_eq!(broker.connect_attempts(), 2);
    }
}
