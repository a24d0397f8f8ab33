//! Process boundary for the students service.
//!
//! Wires the students context to the message bus, renders command outcomes
//! as [`ApiResponse`]s, and exposes health and Prometheus metrics endpoints.

pub mod config;
pub mod error;
pub mod ops;
pub mod response;
pub mod telemetry;

use std::sync::Arc;

use broker::{BrokerTransport, MessageBus};
use mediator::{Command, Mediator};
use students::InMemoryStudentRepository;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use response::ApiResponse;

/// The running students service: configuration, bus, mediator and storage.
pub struct StudentsService {
    config: Config,
    bus: Arc<MessageBus>,
    mediator: Mediator,
    repository: InMemoryStudentRepository,
}

impl StudentsService {
    /// Wires the service over `transport`. Nothing connects until [`start`](Self::start).
    pub fn new(transport: Arc<dyn BrokerTransport>, config: Config) -> Result<Self, ApiError> {
        let bus = Arc::new(MessageBus::new(transport, &config.broker));
        let repository = InMemoryStudentRepository::new();
        let mediator = students::build_mediator(repository.clone(), bus.publisher().clone())?;
        Ok(Self {
            config,
            bus,
            mediator,
            repository,
        })
    }

    /// Registers the integration consumers on the broker.
    #[tracing::instrument(skip(self), fields(service = %self.config.service_name))]
    pub async fn start(&self) -> Result<(), ApiError> {
        students::respond_to_user_registrations(&self.bus, self.mediator.clone()).await?;
        tracing::info!(
            subscriptions = ?self.bus.active_subscriptions(),
            "integration consumers started"
        );
        Ok(())
    }

    /// Dispatches a command in its own unit of work and renders the outcome.
    ///
    /// Validation failures are a 400 response, not an error. Domain
    /// exceptions and handler resolution failures are returned as
    /// [`ApiError`].
    pub async fn dispatch<C: Command>(&self, command: C) -> Result<ApiResponse<C::Output>, ApiError> {
        let scope = self.mediator.scope();
        let result = scope.send(command).await?;
        let notifications = scope.finish();
        let response = ApiResponse::from_command(result, &notifications);
        metrics::counter!(
            "service_command_responses_total",
            "command" => std::any::type_name::<C>(),
            "status" => response.status.to_string()
        )
        .increment(1);
        Ok(response)
    }

    /// Closes the broker session.
    pub async fn shutdown(&self) {
        self.bus.dispose().await;
        tracing::info!("broker session closed");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn mediator(&self) -> &Mediator {
        &self.mediator
    }

    pub fn repository(&self) -> &InMemoryStudentRepository {
        &self.repository
    }
}
