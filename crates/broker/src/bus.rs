//! One connection manager shared by publisher, subscriber and request/responder.

use std::future::Future;
use std::sync::Arc;

use common::{IntegrationEvent, MessageId};

use crate::config::BrokerConfig;
use crate::connection::ConnectionManager;
use crate::publisher::{PublishStatus, Publisher};
use crate::request::{Request, RequestResponder};
use crate::subscriber::{HandlerError, Subscriber};
use crate::transport::BrokerTransport;
use crate::Result;

/// The messaging clients of one process over a single broker session.
pub struct MessageBus {
    connection: Arc<ConnectionManager>,
    publisher: Publisher,
    subscriber: Subscriber,
    requests: RequestResponder,
}

impl MessageBus {
    /// Creates a bus over `transport`. Nothing connects until first use.
    pub fn new(transport: Arc<dyn BrokerTransport>, config: &BrokerConfig) -> Self {
        let connection = Arc::new(ConnectionManager::new(
            transport,
            config.connection_string.clone(),
            config.retry_policy(),
        ));
        Self {
            publisher: Publisher::new(Arc::clone(&connection)),
            subscriber: Subscriber::new(Arc::clone(&connection)),
            requests: RequestResponder::new(Arc::clone(&connection), config.request_timeout),
            connection,
        }
    }

    /// Returns the shared connection manager.
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Returns a cloneable publisher handle.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Returns whether the broker session is healthy right now.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// See [`Publisher::publish`].
    pub async fn publish<E: IntegrationEvent>(&self, event: &E) -> PublishStatus {
        self.publisher.publish(event).await
    }

    /// See [`Publisher::try_publish`].
    pub async fn try_publish<E: IntegrationEvent>(&self, event: &E) -> Result<MessageId> {
        self.publisher.try_publish(event).await
    }

    /// See [`Subscriber::subscribe`].
    pub async fn subscribe<E, H, Fut>(&self, subscription_id: &str, handler: H) -> Result<()>
    where
        E: IntegrationEvent,
        H: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
    {
        self.subscriber.subscribe(subscription_id, handler).await
    }

    /// See [`Subscriber::unsubscribe`].
    pub async fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.subscriber.unsubscribe(subscription_id).await
    }

    /// Returns the IDs of every running subscription on the bus, including
    /// the request/responder ones.
    pub fn active_subscriptions(&self) -> Vec<String> {
        let mut ids = self.subscriber.active_subscriptions();
        ids.extend(self.requests.active_subscriptions());
        ids.sort();
        ids
    }

    /// See [`RequestResponder::request`].
    pub async fn request<R: Request>(&self, request: &R) -> Result<R::Response> {
        self.requests.request(request).await
    }

    /// See [`RequestResponder::respond`].
    pub async fn respond<R, H, Fut>(&self, handler: H) -> Result<()>
    where
        R: Request,
        H: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R::Response, HandlerError>> + Send + 'static,
    {
        self.requests.respond(handler).await
    }

    /// Closes the broker session. Later operations reconnect.
    pub async fn dispose(&self) {
        self.connection.dispose().await;
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("connection", &self.connection)
            .field("subscriptions", &self.active_subscriptions())
            .finish_non_exhaustive()
    }
}
