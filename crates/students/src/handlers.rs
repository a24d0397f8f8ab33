//! Command handlers for the students context.

use async_trait::async_trait;
use broker::Publisher;
use common::{AggregateId, MessageHeader};
use mediator::{
    CommandHandler, CommandPipeline, CommandResult, DomainException, MediatorError,
    MediatorScope, Result,
};

use crate::commands::{EnrollStudent, RegisterStudent};
use crate::events::{StudentEnrolled, StudentEnrolledIntegrationEvent, StudentRegistered};
use crate::repository::{StudentRepository, StudentTransaction};
use crate::student::{STUDENT_ENTITY, Student};

/// Handles [`RegisterStudent`].
pub struct RegisterStudentHandler<R: StudentRepository> {
    repository: R,
}

impl<R: StudentRepository> RegisterStudentHandler<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: StudentRepository> CommandHandler<RegisterStudent> for RegisterStudentHandler<R> {
    #[tracing::instrument(skip_all, fields(student_id = %command.student_id))]
    async fn handle(
        &self,
        command: RegisterStudent,
        scope: &MediatorScope,
    ) -> Result<CommandResult<AggregateId>> {
        let mut pipeline = CommandPipeline::new(scope, STUDENT_ENTITY, command.student_id);
        if !pipeline.validate(&command).await? {
            return Ok(pipeline.halt());
        }

        let existing = self
            .repository
            .find(command.student_id)
            .await
            .map_err(MediatorError::handler::<RegisterStudent>)?;
        if existing.is_some() {
            return Err(DomainException::new(format!(
                "A student with id {} is already registered",
                command.student_id
            ))
            .into());
        }

        let student = Student::register(command.student_id, &command.name, &command.email);
        let tx = self.repository.begin();
        tx.save(student.clone());
        if !pipeline.commit(&tx).await? {
            return Ok(pipeline.halt());
        }

        scope
            .publish(&StudentRegistered {
                header: MessageHeader::event(),
                student_id: student.id(),
                name: command.name,
                email: command.email,
            })
            .await?;

        tracing::info!("student registered");
        Ok(pipeline.complete(student.id()))
    }
}

/// Handles [`EnrollStudent`] and announces the enrollment to other services.
pub struct EnrollStudentHandler<R: StudentRepository> {
    repository: R,
    publisher: Publisher,
}

impl<R: StudentRepository> EnrollStudentHandler<R> {
    pub fn new(repository: R, publisher: Publisher) -> Self {
        Self {
            repository,
            publisher,
        }
    }
}

#[async_trait]
impl<R: StudentRepository> CommandHandler<EnrollStudent> for EnrollStudentHandler<R> {
    #[tracing::instrument(
        skip_all,
        fields(student_id = %command.student_id, course_id = %command.course_id)
    )]
    async fn handle(&self, command: EnrollStudent, scope: &MediatorScope) -> Result<CommandResult<()>> {
        let mut pipeline = CommandPipeline::new(scope, STUDENT_ENTITY, command.student_id);
        if !pipeline.validate(&command).await? {
            return Ok(pipeline.halt());
        }

        let loaded = self
            .repository
            .find(command.student_id)
            .await
            .map_err(MediatorError::handler::<EnrollStudent>)?;
        let Some(mut student) = pipeline.require_found(loaded).await? else {
            return Ok(pipeline.halt());
        };

        let enrollment = student.enroll(command.course_id)?;

        let tx = self.repository.begin();
        tx.save(student);
        if !pipeline.commit(&tx).await? {
            return Ok(pipeline.halt());
        }

        scope
            .publish(&StudentEnrolled {
                header: MessageHeader::event(),
                student_id: command.student_id,
                course_id: command.course_id,
                enrolled_at: enrollment.enrolled_at,
            })
            .await?;

        // best effort: a broker outage must not undo a committed enrollment
        self.publisher
            .publish(&StudentEnrolledIntegrationEvent {
                student_id: command.student_id,
                course_id: command.course_id,
                enrolled_at: enrollment.enrolled_at,
            })
            .await;

        tracing::info!("student enrolled");
        Ok(pipeline.complete(()))
    }
}
