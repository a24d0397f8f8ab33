//! Lazily established, self-healing broker connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::retry::RetryPolicy;
use crate::transport::{BrokerConnection, BrokerTransport};
use crate::{BrokerError, Result};

/// Owns the process-wide broker session.
///
/// At most one live connection exists at a time. The first caller that finds
/// the connection missing or unhealthy establishes a new one under a mutex;
/// concurrent callers wait for that attempt and then observe its outcome
/// instead of opening duplicate sessions. A connection found unhealthy is
/// closed and discarded, never reused.
///
/// Share it behind an `Arc` between the publisher, subscriber and
/// request/responder.
pub struct ConnectionManager {
    transport: Arc<dyn BrokerTransport>,
    connection_string: String,
    policy: RetryPolicy,
    current: RwLock<Option<Arc<dyn BrokerConnection>>>,
    connect_gate: Mutex<()>,
    disposals: AtomicU64,
}

impl ConnectionManager {
    /// Creates a manager. No connection is attempted until first use.
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        connection_string: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            connection_string: connection_string.into(),
            policy,
            current: RwLock::new(None),
            connect_gate: Mutex::new(()),
            disposals: AtomicU64::new(0),
        }
    }

    /// Returns the retry policy used for connection attempts.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Returns the configured connection string. May embed credentials; log
    /// [`redact`]ed.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Returns whether the current connection is healthy right now.
    pub fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    /// Returns a healthy connection, establishing one if needed.
    ///
    /// Idempotent: returns immediately when already connected. Otherwise makes
    /// up to `policy.max_attempts()` attempts with exponential backoff and
    /// fails with [`BrokerError::Unavailable`] if none succeeds. A failed call
    /// latches nothing; the next call starts a fresh retry sequence.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_connected(&self) -> Result<Arc<dyn BrokerConnection>> {
        if let Some(connection) = self.live_connection() {
            return Ok(connection);
        }

        let _gate = self.connect_gate.lock().await;

        // Another caller may have connected while we waited on the gate.
        if let Some(connection) = self.live_connection() {
            return Ok(connection);
        }

        self.discard_stale().await;

        let outcome = self
            .policy
            .execute("broker.connect", |attempt| {
                tracing::debug!(attempt, "connecting to broker");
                metrics::counter!("broker_connection_attempts_total").increment(1);
                self.transport.connect(&self.connection_string)
            })
            .await;

        match outcome {
            Ok(connection) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&connection));
                tracing::info!(
                    broker = %redact(&self.connection_string),
                    "broker connection established"
                );
                Ok(connection)
            }
            Err(failure) => {
                metrics::counter!("broker_connection_failures_total").increment(1);
                tracing::error!(
                    attempts = failure.attempts,
                    error = %failure.error,
                    "broker unavailable"
                );
                Err(BrokerError::Unavailable {
                    attempts: failure.attempts,
                    reason: failure.error.to_string(),
                })
            }
        }
    }

    /// Counts explicit [`dispose`](Self::dispose) calls.
    ///
    /// Background consumers record it when they start and stop, instead of
    /// reconnecting, once it has moved on.
    pub fn disposals(&self) -> u64 {
        self.disposals.load(Ordering::SeqCst)
    }

    /// Closes and forgets the current connection. The next operation reconnects.
    ///
    /// Subscriptions registered before the call are torn down with the
    /// session and are not resumed.
    #[tracing::instrument(skip(self))]
    pub async fn dispose(&self) {
        let _gate = self.connect_gate.lock().await;
        self.disposals.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = self.take_current() {
            connection.close().await;
            tracing::info!("broker connection disposed");
        }
    }

    fn live_connection(&self) -> Option<Arc<dyn BrokerConnection>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|connection| connection.is_open())
            .cloned()
    }

    fn take_current(&self) -> Option<Arc<dyn BrokerConnection>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn discard_stale(&self) {
        if let Some(stale) = self.take_current() {
            tracing::warn!("discarding unhealthy broker connection");
            stale.close().await;
        }
    }
}

/// Masks the user-info part (`user:password@`) of a connection string.
pub fn redact(connection_string: &str) -> String {
    match connection_string.rsplit_once('@') {
        Some((credentials, host)) => {
            let scheme_end = credentials.find("://").map_or(0, |i| i + 3);
            format!("{}***@{host}", &credentials[..scheme_end])
        }
        None => connection_string.to_string(),
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // connection string may embed credentials
        f.debug_struct("ConnectionManager")
            .field("broker", &redact(&self.connection_string))
            .field("policy", &self.policy)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
