//! Students service entry point.

use std::sync::Arc;

use broker::InMemoryBroker;
use service::{Config, StudentsService};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    service::telemetry::init_tracing(&config).expect("failed to install tracing subscriber");

    // 2. Install Prometheus metrics recorder
    let metrics_handle =
        service::telemetry::install_metrics().expect("failed to install Prometheus recorder");

    // 3. Wire the service. The wire protocol is pluggable; the in-process
    //    broker serves local runs.
    tracing::warn!("no broker wire protocol configured, using the in-process broker");
    let transport = Arc::new(InMemoryBroker::new());
    let students = Arc::new(
        StudentsService::new(transport, config.clone()).expect("invalid handler registry"),
    );

    // 4. Start integration consumers
    if let Err(e) = students.start().await {
        tracing::error!(error = %e, "could not start integration consumers");
    }

    // 5. Serve operational endpoints
    let addr = config.addr();
    tracing::info!(%addr, service = %config.service_name, "starting students service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, service::ops::router(Arc::clone(&students), metrics_handle))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    students.shutdown().await;
    tracing::info!("service shut down gracefully");
}
