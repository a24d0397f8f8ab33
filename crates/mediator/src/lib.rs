//! In-process mediator for commands, events and domain notifications.
//!
//! This crate provides:
//! - `Command` / `Event` traits and the `CommandResult` returned by dispatch
//! - `DomainNotification` and the per-unit-of-work `NotificationContext`
//! - `Mediator` (handler registry) and `MediatorScope` (one unit of work)
//! - `Validator` rule builder for command input
//! - `CommandPipeline` and `UnitOfWork` for the standard handler flow

pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod mediator;
pub mod notification;
pub mod pipeline;
pub mod validation;

pub use command::{Command, CommandResult};
pub use error::{DomainException, MediatorError, PersistenceError, Result};
pub use event::{DomainNotification, Event};
pub use handler::{CommandHandler, EventHandler};
pub use mediator::{Mediator, MediatorBuilder, MediatorScope};
pub use notification::NotificationContext;
pub use pipeline::{CommandPipeline, PipelineStage, UnitOfWork};
pub use validation::{ValidationFailure, ValidationResult, Validator};
