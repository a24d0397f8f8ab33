//! Student domain events and integration messages.

use broker::{Request, ResponseMessage};
use chrono::{DateTime, Utc};
use common::{AggregateId, IntegrationEvent, MessageHeader};
use mediator::Event;
use serde::{Deserialize, Serialize};

/// A student was registered.
#[derive(Debug, Clone)]
pub struct StudentRegistered {
    pub header: MessageHeader,
    pub student_id: AggregateId,
    pub name: String,
    pub email: String,
}

impl Event for StudentRegistered {
    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }
}

/// A student was enrolled in a course.
#[derive(Debug, Clone)]
pub struct StudentEnrolled {
    pub header: MessageHeader,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub enrolled_at: DateTime<Utc>,
}

impl Event for StudentEnrolled {
    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }
}

/// Sent by the auth service when a user account is created; answered with the
/// outcome of registering the matching student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredIntegrationEvent {
    pub id: AggregateId,
    pub name: String,
    pub email: String,
}

impl IntegrationEvent for UserRegisteredIntegrationEvent {
    fn aggregate_id(&self) -> AggregateId {
        self.id
    }
}

impl Request for UserRegisteredIntegrationEvent {
    type Response = ResponseMessage;
}

/// Published after a student is enrolled in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEnrolledIntegrationEvent {
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub enrolled_at: DateTime<Utc>,
}

impl IntegrationEvent for StudentEnrolledIntegrationEvent {
    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }
}
