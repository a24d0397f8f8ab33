//! Integration boundary: requests from other services handled by this context.

use broker::{HandlerError, MessageBus, ResponseMessage};
use mediator::{Mediator, MediatorError};

use crate::commands::RegisterStudent;
use crate::events::UserRegisteredIntegrationEvent;

/// Answers user registration requests from the auth service by registering
/// the matching student.
pub async fn respond_to_user_registrations(bus: &MessageBus, mediator: Mediator) -> broker::Result<()> {
    bus.respond(move |event: UserRegisteredIntegrationEvent| {
        let mediator = mediator.clone();
        async move {
            let response = register_student(&mediator, event).await?;
            Ok::<_, HandlerError>(response)
        }
    })
    .await
}

/// Dispatches [`RegisterStudent`] in its own unit of work and turns the
/// outcome into a [`ResponseMessage`].
///
/// Validation failures and domain exceptions become response errors.
/// Handler resolution failures propagate; they are programming errors.
#[tracing::instrument(skip_all, fields(student_id = %event.id))]
pub async fn register_student(
    mediator: &Mediator,
    event: UserRegisteredIntegrationEvent,
) -> Result<ResponseMessage, MediatorError> {
    let scope = mediator.scope();
    let outcome = scope
        .send(RegisterStudent::new(event.id, event.name, event.email))
        .await;
    let notifications = scope.finish();

    match outcome {
        Ok(result) if result.is_valid() => Ok(ResponseMessage::success()),
        Ok(result) if notifications.is_empty() => {
            Ok(ResponseMessage::with_errors(result.errors().iter().cloned()))
        }
        Ok(_) => Ok(ResponseMessage::with_errors(
            notifications.iter().map(|n| n.value().to_string()),
        )),
        Err(MediatorError::Domain(e)) => {
            tracing::warn!(error = %e, "registration rejected");
            Ok(ResponseMessage::with_errors([e.message()]))
        }
        Err(e) => Err(e),
    }
}
