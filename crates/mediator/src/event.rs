//! In-process events and domain notifications.

use common::{AggregateId, MessageHeader};
use serde::{Deserialize, Serialize};

/// Something that already happened, dispatched to zero or more handlers.
pub trait Event: Send + Sync + 'static {
    /// Message identity and creation time.
    fn header(&self) -> &MessageHeader;

    /// The aggregate root the event is about.
    fn aggregate_id(&self) -> AggregateId;
}

/// One business-rule violation: `(aggregate root, context key, message)`.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNotification {
    header: MessageHeader,
    aggregate_id: AggregateId,
    key: String,
    value: String,
}

impl DomainNotification {
    /// Creates a notification about `aggregate_id` under context `key`.
    pub fn new(aggregate_id: AggregateId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::notification(),
            aggregate_id,
            key: key.into(),
            value: value.into(),
        }
    }

    /// The context key, usually the domain entity name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The human-readable message.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Event for DomainNotification {
    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MessageKind;

    #[test]
    fn notification_carries_its_triple() {
        let id = AggregateId::new();
        let n = DomainNotification::new(id, "Student", "Name is required");

        assert_eq!(n.aggregate_id(), id);
        assert_eq!(n.key(), "Student");
        assert_eq!(n.value(), "Name is required");
        assert_eq!(n.header().kind, MessageKind::DomainNotification);
    }

    #[test]
    fn notifications_have_distinct_ids() {
        let id = AggregateId::new();
        let a = DomainNotification::new(id, "Student", "x");
        let b = DomainNotification::new(id, "Student", "x");
        assert_ne!(a.header().message_id, b.header().message_id);
    }

    #[test]
    fn serializes_flat() {
        let n = DomainNotification::new(AggregateId::nil(), "Student", "Email is invalid");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["key"], "Student");
        assert_eq!(json["value"], "Email is invalid");
    }
}
