//! Students bounded context.
//!
//! This crate provides:
//! - `Student` aggregate with enrollment rules
//! - `RegisterStudent` and `EnrollStudent` commands with their validators
//! - Domain events and the integration messages exchanged with other services
//! - `StudentRepository` and an in-memory implementation
//! - Command handlers following the mediator's command pipeline
//! - The responder answering user registrations from the auth service

pub mod commands;
pub mod consumers;
pub mod events;
pub mod handlers;
pub mod repository;
pub mod student;

pub use commands::{EnrollStudent, RegisterStudent};
pub use consumers::{register_student, respond_to_user_registrations};
pub use events::{
    StudentEnrolled, StudentEnrolledIntegrationEvent, StudentRegistered,
    UserRegisteredIntegrationEvent,
};
pub use handlers::{EnrollStudentHandler, RegisterStudentHandler};
pub use repository::{
    InMemoryStudentRepository, InMemoryStudentTransaction, StudentRepository, StudentTransaction,
};
pub use student::{Enrollment, MAX_NAME_LENGTH, STUDENT_ENTITY, Student};

use broker::Publisher;
use mediator::Mediator;

/// Builds a mediator with every students command handler registered.
pub fn build_mediator<R>(repository: R, publisher: Publisher) -> mediator::Result<Mediator>
where
    R: StudentRepository + Clone,
{
    Mediator::builder()
        .command(RegisterStudentHandler::new(repository.clone()))
        .command(EnrollStudentHandler::new(repository, publisher))
        .try_build()
}
