//! Message kinds, headers and the integration event capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::topic::topic_for;
use crate::types::{AggregateId, MessageId};

/// The closed set of message kinds flowing through the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A request to change state, handled by exactly one handler.
    Command,
    /// Something that already happened, handled by zero or more handlers.
    Event,
    /// A recorded business-rule violation.
    DomainNotification,
    /// An event that crosses a service boundary.
    IntegrationEvent,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Command => "command",
            MessageKind::Event => "event",
            MessageKind::DomainNotification => "domain_notification",
            MessageKind::IntegrationEvent => "integration_event",
        };
        f.write_str(name)
    }
}

/// Identity and creation time carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique identifier for this message.
    pub message_id: MessageId,

    /// Which kind of message this header belongs to.
    pub kind: MessageKind,

    /// When the message was created.
    pub timestamp: DateTime<Utc>,
}

impl MessageHeader {
    /// Creates a header with a fresh ID stamped with the current time.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            message_id: MessageId::new(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Header for a command.
    pub fn command() -> Self {
        Self::new(MessageKind::Command)
    }

    /// Header for an in-process event.
    pub fn event() -> Self {
        Self::new(MessageKind::Event)
    }

    /// Header for a domain notification.
    pub fn notification() -> Self {
        Self::new(MessageKind::DomainNotification)
    }
}

/// An event published across a service boundary.
///
/// Implementors are flat, JSON-serializable records with no service-internal
/// types. Producers and consumers deploy independently, so field changes must
/// be additive only.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The aggregate root this event is about.
    fn aggregate_id(&self) -> AggregateId;

    /// Routing key used on the broker.
    ///
    /// Derived from the type name by default; override to pin a topic that
    /// must survive a rename.
    fn topic() -> String
    where
        Self: Sized,
    {
        topic_for::<Self>()
    }
}
