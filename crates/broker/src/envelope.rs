use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::MessageId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::Result;

/// Header key marking a reply that carries a responder failure instead of a payload.
pub const ERROR_HEADER: &str = "x-error";

/// A message as it travels over the broker.
///
/// The payload is the flat JSON form of an integration event or request.
/// Every message carries a generated ID, a timestamp and a persistence flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Unique identifier for this message.
    pub message_id: MessageId,

    /// Short type name of the payload (e.g., "UserRegisteredIntegrationEvent").
    pub message_type: String,

    /// Routing key the message was published to.
    pub topic: String,

    /// When the message was created.
    pub timestamp: DateTime<Utc>,

    /// Whether the broker should persist the message to disk.
    pub persistent: bool,

    /// Correlates a request with its reply.
    pub correlation_id: Option<Uuid>,

    /// Topic the reply to this request should be published to.
    pub reply_to: Option<String>,

    /// The payload as JSON.
    pub payload: serde_json::Value,

    /// Additional transport headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl WireMessage {
    /// Creates a persistent message with a fresh ID carrying `payload` on `topic`.
    pub fn new<T: Serialize>(topic: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self {
            message_id: MessageId::new(),
            message_type: short_type_name::<T>().to_string(),
            topic: topic.into(),
            timestamp: Utc::now(),
            persistent: true,
            correlation_id: None,
            reply_to: None,
            payload: serde_json::to_value(payload)?,
            headers: HashMap::new(),
        })
    }

    /// Creates a new wire message builder.
    pub fn builder() -> WireMessageBuilder {
        WireMessageBuilder::default()
    }

    /// Decodes the payload into a typed message.
    ///
    /// Unknown fields are ignored so producers can add fields without
    /// breaking older consumers.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Returns the relayed responder error, if this reply carries one.
    pub fn error(&self) -> Option<&str> {
        self.headers.get(ERROR_HEADER).map(String::as_str)
    }
}

/// Builder for constructing wire messages.
#[derive(Debug, Default)]
pub struct WireMessageBuilder {
    message_id: Option<MessageId>,
    message_type: Option<String>,
    topic: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    persistent: Option<bool>,
    correlation_id: Option<Uuid>,
    reply_to: Option<String>,
    payload: Option<serde_json::Value>,
    headers: HashMap<String, String>,
}

impl WireMessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Sets the message type name.
    pub fn message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    /// Sets the topic.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the persistence flag. Defaults to true.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Sets the correlation ID.
    pub fn correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Sets the reply topic.
    pub fn reply_to(mut self, topic: impl Into<String>) -> Self {
        self.reply_to = Some(topic.into());
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Tries to build the message, returning None if the topic or payload is missing.
    pub fn try_build(self) -> Option<WireMessage> {
        let topic = self.topic?;
        Some(WireMessage {
            message_id: self.message_id.unwrap_or_default(),
            message_type: self.message_type.unwrap_or_else(|| topic.clone()),
            topic,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            persistent: self.persistent.unwrap_or(true),
            correlation_id: self.correlation_id,
            reply_to: self.reply_to,
            payload: self.payload?,
            headers: self.headers,
        })
    }
}

/// Short, path-free name of a type, used as the wire `message_type`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
