//! Handler registry and per-unit-of-work dispatch.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::command::{Command, CommandResult};
use crate::error::{MediatorError, Result};
use crate::event::{DomainNotification, Event};
use crate::handler::{CommandHandler, EventHandler};
use crate::notification::NotificationContext;

type ErasedHandler = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct Registry {
    // each value holds an `Arc<dyn CommandHandler<C>>` for the keyed `C`
    commands: HashMap<TypeId, ErasedHandler>,
    // each entry holds an `Arc<dyn EventHandler<E>>` for the keyed `E`
    events: HashMap<TypeId, Vec<ErasedHandler>>,
}

impl Registry {
    fn command_handler<C: Command>(&self) -> Result<Arc<dyn CommandHandler<C>>> {
        self.commands
            .get(&TypeId::of::<C>())
            .and_then(|handler| handler.downcast_ref::<Arc<dyn CommandHandler<C>>>())
            .cloned()
            .ok_or(MediatorError::NoHandlerRegistered {
                message_type: type_name::<C>(),
            })
    }

    fn event_handlers<E: Event>(&self) -> Vec<Arc<dyn EventHandler<E>>> {
        self.events
            .get(&TypeId::of::<E>())
            .map(|handlers| {
                handlers
                    .iter()
                    .filter_map(|handler| handler.downcast_ref::<Arc<dyn EventHandler<E>>>())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builder for a [`Mediator`].
///
/// Registering two handlers for the same command type is a programming
/// error reported by [`try_build`](Self::try_build), before any dispatch.
#[derive(Default)]
pub struct MediatorBuilder {
    registry: Registry,
    duplicate: Option<&'static str>,
}

impl MediatorBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the single handler for command type `C`.
    pub fn command<C, H>(mut self, handler: H) -> Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        let previous = self
            .registry
            .commands
            .insert(TypeId::of::<C>(), Box::new(handler));
        if previous.is_some() && self.duplicate.is_none() {
            self.duplicate = Some(type_name::<C>());
        }
        self
    }

    /// Adds a handler for event type `E`. Handlers run in registration order.
    pub fn event<E, H>(mut self, handler: H) -> Self
    where
        E: Event,
        H: EventHandler<E>,
    {
        let handler: Arc<dyn EventHandler<E>> = Arc::new(handler);
        self.registry
            .events
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Builds the mediator, failing if a command type has two handlers.
    pub fn try_build(self) -> Result<Mediator> {
        if let Some(message_type) = self.duplicate {
            return Err(MediatorError::DuplicateRegistration { message_type });
        }
        Ok(Mediator {
            registry: Arc::new(self.registry),
        })
    }
}

/// In-process dispatcher. Cheap to clone; share one per process.
///
/// Dispatch happens through a [`MediatorScope`] opened per unit of work,
/// which owns that unit's [`NotificationContext`].
#[derive(Clone)]
pub struct Mediator {
    registry: Arc<Registry>,
}

impl Mediator {
    /// Creates a new builder.
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Opens a unit of work with a fresh notification context.
    pub fn scope(&self) -> MediatorScope {
        MediatorScope {
            registry: Arc::clone(&self.registry),
            notifications: NotificationContext::new(),
        }
    }

    /// Returns true if a handler is registered for command type `C`.
    pub fn handles<C: Command>(&self) -> bool {
        self.registry.commands.contains_key(&TypeId::of::<C>())
    }

    /// Returns the number of handlers registered for event type `E`.
    pub fn event_handler_count<E: Event>(&self) -> usize {
        self.registry
            .events
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("commands", &self.registry.commands.len())
            .field("event_types", &self.registry.events.len())
            .finish()
    }
}

/// One unit of work: a request or a consumed message.
///
/// Every handler reached while dispatching through the scope shares its
/// notification context. Read the notifications at the boundary with
/// [`finish`](Self::finish), which consumes the scope.
pub struct MediatorScope {
    registry: Arc<Registry>,
    notifications: NotificationContext,
}

impl MediatorScope {
    /// Dispatches a command to its single handler and returns its result unmodified.
    #[tracing::instrument(
        skip(self, command),
        fields(command = type_name::<C>(), message_id = %command.header().message_id)
    )]
    pub async fn send<C: Command>(&self, command: C) -> Result<CommandResult<C::Output>> {
        let handler = self.registry.command_handler::<C>()?;
        metrics::counter!("mediator_commands_total").increment(1);

        let result = handler.handle(command, self).await?;

        if !result.is_valid() {
            metrics::counter!("mediator_commands_invalid_total").increment(1);
            tracing::debug!(errors = result.errors().len(), "command rejected");
        }
        Ok(result)
    }

    /// Dispatches an event to every handler in registration order.
    ///
    /// The first handler error stops dispatch and is returned; later handlers
    /// do not run.
    #[tracing::instrument(
        skip(self, event),
        fields(event = type_name::<E>(), message_id = %event.header().message_id)
    )]
    pub async fn publish<E: Event>(&self, event: &E) -> Result<()> {
        let handlers = self.registry.event_handlers::<E>();
        metrics::counter!("mediator_events_published_total").increment(1);

        for (index, handler) in handlers.iter().enumerate() {
            if let Err(e) = handler.handle(event, self).await {
                tracing::warn!(handler = index, error = %e, "event handler failed, stopping dispatch");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Records a notification in this scope, then runs any registered
    /// notification handlers.
    pub async fn publish_domain_notification(&self, notification: DomainNotification) -> Result<()> {
        tracing::debug!(key = notification.key(), value = notification.value(), "domain notification");
        self.notifications.add(notification.clone());
        self.publish(&notification).await
    }

    /// Returns the notification context of this unit of work.
    pub fn notifications(&self) -> &NotificationContext {
        &self.notifications
    }

    /// Returns true if any notification was recorded.
    pub fn has_notifications(&self) -> bool {
        self.notifications.has_notifications()
    }

    /// Ends the unit of work, returning its notifications in insertion order.
    pub fn finish(self) -> Vec<DomainNotification> {
        self.notifications.into_notifications()
    }
}

impl std::fmt::Debug for MediatorScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediatorScope")
            .field("notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}
