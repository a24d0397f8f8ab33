//! Handler traits registered with the mediator.

use async_trait::async_trait;

use crate::command::{Command, CommandResult};
use crate::error::Result;
use crate::event::Event;
use crate::mediator::MediatorScope;

/// Handles one command type.
///
/// The handler receives the scope of the current unit of work so it can
/// publish events and domain notifications into it.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    async fn handle(&self, command: C, scope: &MediatorScope) -> Result<CommandResult<C::Output>>;
}

/// Handles one event type. Many handlers may be registered per event type.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: &E, scope: &MediatorScope) -> Result<()>;
}
