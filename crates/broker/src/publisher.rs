//! Best-effort integration event publishing.

use std::sync::Arc;

use common::{IntegrationEvent, MessageId};

use crate::connection::ConnectionManager;
use crate::{Result, WireMessage};

/// Header carrying the aggregate root the event is about.
pub const AGGREGATE_ID_HEADER: &str = "aggregate-id";

/// Outcome of a best-effort publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// The broker accepted the message.
    Sent(MessageId),
    /// The message was not handed to the broker; the failure was logged.
    Dropped,
}

impl PublishStatus {
    /// Returns true if the broker accepted the message.
    pub fn is_sent(&self) -> bool {
        matches!(self, PublishStatus::Sent(_))
    }
}

/// Fire-and-forget publisher of integration events.
///
/// Delivery is at-most-once from the caller's point of view: the message is
/// handed to the transport exactly once after a connection is secured, and no
/// acknowledgement is awaited.
#[derive(Debug, Clone)]
pub struct Publisher {
    connection: Arc<ConnectionManager>,
}

impl Publisher {
    /// Creates a publisher sharing the given connection manager.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Publishes an event, never failing the caller's unit of work.
    ///
    /// If the broker stays unreachable through the retry policy, or the
    /// transport rejects the message, the failure is logged and
    /// [`PublishStatus::Dropped`] is returned.
    #[tracing::instrument(skip(self, event), fields(topic = %E::topic()))]
    pub async fn publish<E: IntegrationEvent>(&self, event: &E) -> PublishStatus {
        match self.try_publish(event).await {
            Ok(message_id) => PublishStatus::Sent(message_id),
            Err(e) => {
                metrics::counter!("broker_messages_dropped_total").increment(1);
                tracing::error!(error = %e, "integration event dropped");
                PublishStatus::Dropped
            }
        }
    }

    /// Publishes an event, surfacing any failure to the caller.
    pub async fn try_publish<E: IntegrationEvent>(&self, event: &E) -> Result<MessageId> {
        let mut message = WireMessage::new(E::topic(), event)?;
        message.headers.insert(
            AGGREGATE_ID_HEADER.to_string(),
            event.aggregate_id().to_string(),
        );
        let message_id = message.message_id;

        let connection = self.connection.ensure_connected().await?;
        connection.publish(message).await?;

        metrics::counter!("broker_messages_published_total").increment(1);
        tracing::debug!(%message_id, "integration event published");
        Ok(message_id)
    }
}
