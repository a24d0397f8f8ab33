//! The validate, load, execute, persist, report flow shared by command handlers.
//!
//! ```text
//! Validate ──invalid──▶ halt (one notification per failure)
//!    │
//!  Load ────missing──▶ halt (one not-found notification)
//!    │
//! Execute ──DomainException──▶ error to the boundary
//!    │
//! Persist ──commit failed──▶ halt (one persistence notification)
//!    │
//! Report ──▶ CommandResult::success(data)
//! ```
//!
//! Validation always precedes any mutation. Anticipated rule violations
//! become notifications; [`DomainException`](crate::DomainException) is
//! reserved for illegal state transitions.

use std::fmt;

use async_trait::async_trait;
use common::AggregateId;

use crate::command::{Command, CommandResult};
use crate::error::{PersistenceError, Result};
use crate::event::DomainNotification;
use crate::mediator::MediatorScope;

/// Context key used for commit failure notifications.
pub const PERSISTENCE_KEY: &str = "Persistence";

/// Message recorded when a commit fails.
pub const PERSISTENCE_FAILED: &str = "The changes could not be saved. Please try again.";

/// Commits the changes staged during one unit of work.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self) -> std::result::Result<(), PersistenceError>;
}

/// Where a command pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validate,
    Load,
    Execute,
    Persist,
    Report,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validate => "validate",
            PipelineStage::Load => "load",
            PipelineStage::Execute => "execute",
            PipelineStage::Persist => "persist",
            PipelineStage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Step helper a command handler drives through its stages.
///
/// Each failing step records its notifications in the scope and returns
/// false or `None`; the handler then returns [`halt`](Self::halt).
///
/// ```ignore
/// let mut pipeline = CommandPipeline::new(scope, "Student", command.aggregate_id());
/// if !pipeline.validate(&command).await? {
///     return Ok(pipeline.halt());
/// }
/// let Some(mut student) = pipeline.require_found(repository.find(id)).await? else {
///     return Ok(pipeline.halt());
/// };
/// student.enroll(course_id)?;
/// if !pipeline.commit(&repository).await? {
///     return Ok(pipeline.halt());
/// }
/// Ok(pipeline.complete(student.id()))
/// ```
pub struct CommandPipeline<'a> {
    scope: &'a MediatorScope,
    entity: &'static str,
    aggregate_id: AggregateId,
    stage: PipelineStage,
}

impl<'a> CommandPipeline<'a> {
    /// Starts a pipeline for a command about `aggregate_id` of entity `entity`.
    pub fn new(scope: &'a MediatorScope, entity: &'static str, aggregate_id: AggregateId) -> Self {
        Self {
            scope,
            entity,
            aggregate_id,
            stage: PipelineStage::Validate,
        }
    }

    /// Returns the current stage.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Step 1: runs the command's validator, publishing one notification per
    /// failure. Returns true if the command is valid.
    #[tracing::instrument(skip_all, fields(entity = self.entity))]
    pub async fn validate<C: Command>(&mut self, command: &C) -> Result<bool> {
        self.stage = PipelineStage::Validate;
        let validation = command.validate();
        for failure in validation.failures() {
            self.notify(self.entity, failure.message.clone()).await?;
        }
        if validation.is_valid() {
            self.stage = PipelineStage::Load;
        }
        Ok(validation.is_valid())
    }

    /// Step 2: passes a loaded aggregate through, publishing a single
    /// not-found notification if it is missing.
    pub async fn require_found<T>(&mut self, loaded: Option<T>) -> Result<Option<T>> {
        self.stage = PipelineStage::Load;
        match loaded {
            Some(aggregate) => {
                self.stage = PipelineStage::Execute;
                Ok(Some(aggregate))
            }
            None => {
                let message = format!("{} not found.", self.entity);
                self.notify(self.entity, message).await?;
                Ok(None)
            }
        }
    }

    /// Step 4: commits the unit of work. A failed commit is recorded as one
    /// persistence notification and returns false.
    #[tracing::instrument(skip_all, fields(entity = self.entity))]
    pub async fn commit(&mut self, unit_of_work: &dyn UnitOfWork) -> Result<bool> {
        self.stage = PipelineStage::Persist;
        match unit_of_work.commit().await {
            Ok(()) => {
                self.stage = PipelineStage::Report;
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "commit failed");
                self.notify(PERSISTENCE_KEY, PERSISTENCE_FAILED).await?;
                Ok(false)
            }
        }
    }

    /// Step 5: the valid result.
    pub fn complete<T>(self, data: T) -> CommandResult<T> {
        CommandResult::success(data)
    }

    /// Terminates early with an invalid result built from the scope's notifications.
    pub fn halt<T>(&self) -> CommandResult<T> {
        tracing::debug!(stage = %self.stage, entity = self.entity, "command pipeline halted");
        CommandResult::invalid(self.scope.notifications().messages())
    }

    async fn notify(&self, key: &str, message: impl Into<String>) -> Result<()> {
        self.scope
            .publish_domain_notification(DomainNotification::new(self.aggregate_id, key, message))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::Mediator;
    use crate::event::Event;
    use crate::validation::{ValidationResult, Validator};
    use common::MessageHeader;
    use std::sync::LazyLock;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct RenameCourse {
        header: MessageHeader,
        course_id: AggregateId,
        title: String,
    }

    static RENAME_RULES: LazyLock<Validator<RenameCourse>> = LazyLock::new(|| {
        Validator::new()
            .rule("Title", |c: &RenameCourse| !c.title.is_empty(), "Title is required")
            .rule("CourseId", |c: &RenameCourse| !c.course_id.is_nil(), "Course is required")
    });

    impl Command for RenameCourse {
        type Output = ();

        fn header(&self) -> &MessageHeader {
            &self.header
        }

        fn aggregate_id(&self) -> AggregateId {
            self.course_id
        }

        fn validate(&self) -> ValidationResult {
            RENAME_RULES.validate(self)
        }
    }

    fn rename(course_id: AggregateId, title: &str) -> RenameCourse {
        RenameCourse {
            header: MessageHeader::command(),
            course_id,
            title: title.to_string(),
        }
    }

    #[derive(Default)]
    struct FakeUnitOfWork {
        fail: AtomicBool,
        commits: AtomicU32,
    }

    #[async_trait]
    impl UnitOfWork for FakeUnitOfWork {
        async fn commit(&self) -> std::result::Result<(), PersistenceError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(PersistenceError("disk full".to_string()));
            }
            Ok(())
        }
    }

    fn scope() -> MediatorScope {
        Mediator::builder().try_build().unwrap().scope()
    }

    #[tokio::test]
    async fn test_validate_publishes_one_notification_per_failure() {
        let scope = scope();
        let mut pipeline = CommandPipeline::new(&scope, "Course", AggregateId::nil());

        let valid = pipeline.validate(&rename(AggregateId::nil(), "")).await.unwrap();
        let result: CommandResult<()> = pipeline.halt();

        assert!(!valid);
        assert_eq!(pipeline.stage(), PipelineStage::Validate);
        assert_eq!(result.errors(), ["Title is required", "Course is required"]);
        let notifications = scope.finish();
        assert!(notifications.iter().all(|n| n.key() == "Course"));
    }

    #[tokio::test]
    async fn test_missing_aggregate_records_single_not_found() {
        let scope = scope();
        let id = AggregateId::new();
        let mut pipeline = CommandPipeline::new(&scope, "Course", id);

        assert!(pipeline.validate(&rename(id, "Rust")).await.unwrap());
        let loaded = pipeline.require_found(None::<String>).await.unwrap();

        assert!(loaded.is_none());
        let notifications = scope.finish();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].value(), "Course not found.");
        assert_eq!(notifications[0].aggregate_id(), id);
    }

    #[tokio::test]
    async fn test_commit_failure_becomes_notification() {
        let scope = scope();
        let uow = FakeUnitOfWork::default();
        uow.fail.store(true, Ordering::SeqCst);
        let mut pipeline = CommandPipeline::new(&scope, "Course", AggregateId::new());

        let committed = pipeline.commit(&uow).await.unwrap();

        assert!(!committed);
        assert_eq!(pipeline.stage(), PipelineStage::Persist);
        let result: CommandResult<()> = pipeline.halt();
        assert_eq!(result.errors(), [PERSISTENCE_FAILED]);
    }

    #[tokio::test]
    async fn test_happy_path_reaches_report() {
        let scope = scope();
        let uow = FakeUnitOfWork::default();
        let id = AggregateId::new();
        let mut pipeline = CommandPipeline::new(&scope, "Course", id);

        assert!(pipeline.validate(&rename(id, "Rust")).await.unwrap());
        assert_eq!(pipeline.require_found(Some(1)).await.unwrap(), Some(1));
        assert!(pipeline.commit(&uow).await.unwrap());
        assert_eq!(pipeline.stage(), PipelineStage::Report);

        let result = pipeline.complete(id);
        assert_eq!(result.data(), Some(&id));
        assert_eq!(uow.commits.load(Ordering::SeqCst), 1);
        assert!(!scope.has_notifications());
    }
}
