//! Resilient messaging client for cross-service integration events.
//!
//! Everything runs over a [`ConnectionManager`] that lazily opens a single
//! broker session and reopens it with exponential backoff when it is lost.
//! On top of it sit a best-effort [`Publisher`], a [`Subscriber`] with
//! durable named consumer groups, and a [`RequestResponder`] for correlated
//! request/reply. [`MessageBus`] bundles the three.
//!
//! The broker itself is reached through the [`BrokerTransport`] trait;
//! [`InMemoryBroker`] implements it for tests and local development.

pub mod bus;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod request;
pub mod retry;
pub mod subscriber;
pub mod transport;

pub use bus::MessageBus;
pub use config::BrokerConfig;
pub use connection::ConnectionManager;
pub use envelope::{WireMessage, WireMessageBuilder};
pub use error::{BrokerError, Result};
pub use memory::{DEFAULT_PUBLISH_LOG_CAPACITY, InMemoryBroker};
pub use publisher::{PublishStatus, Publisher};
pub use request::{Request, RequestResponder, ResponseMessage};
pub use retry::{RetryFailure, RetryPolicy};
pub use subscriber::{HandlerError, Subscriber};
pub use transport::{BrokerConnection, BrokerTransport, Delivery};
