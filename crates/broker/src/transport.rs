//! The opaque transport seam.
//!
//! The broker wire protocol lives behind these two traits. A transport knows
//! how to open a session from a connection string; a connection offers
//! fire-and-forget publish and durable, named subscriptions. Request/reply is
//! composed on top of these primitives by [`crate::RequestResponder`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Result, WireMessage};

/// Stream of messages delivered to one subscription.
///
/// The stream ends when the subscription is cancelled or the connection that
/// created it is lost.
pub type Delivery = mpsc::UnboundedReceiver<WireMessage>;

/// Opens broker sessions.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Establishes a new connection. The connection string is opaque.
    async fn connect(&self, connection_string: &str) -> Result<Arc<dyn BrokerConnection>>;
}

/// A live broker session.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Returns whether the session is currently healthy.
    fn is_open(&self) -> bool;

    /// Hands a message to the broker without awaiting delivery.
    async fn publish(&self, message: WireMessage) -> Result<()>;

    /// Registers a consumer group on a topic.
    ///
    /// Registering the same `subscription_id` twice on one topic replaces the
    /// previous registration; it never adds a second consumer.
    async fn subscribe(&self, topic: &str, subscription_id: &str) -> Result<Delivery>;

    /// Removes a consumer group from a topic.
    async fn unsubscribe(&self, topic: &str, subscription_id: &str) -> Result<()>;

    /// Closes the session. Further operations fail with `ConnectionClosed`.
    async fn close(&self);
}
