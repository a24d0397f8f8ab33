//! Shared types for the messaging fabric.

pub mod message;
pub mod topic;
pub mod types;

pub use message::{IntegrationEvent, MessageHeader, MessageKind};
pub use topic::{topic_for, topic_from_type_name};
pub use types::{AggregateId, MessageId};
