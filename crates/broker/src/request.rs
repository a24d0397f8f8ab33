//! Correlated request/reply over publish and subscribe.
//!
//! A requester publishes to the request type's topic with a correlation ID and
//! its private reply topic, then waits for the matching reply. Timeouts are
//! retried through the connection retry policy; the correlation ID stays the
//! same across retries so responders can answer duplicates from cache.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use common::{IntegrationEvent, MessageId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::connection::ConnectionManager;
use crate::envelope::{ERROR_HEADER, short_type_name};
use crate::subscriber::{HandlerError, Subscriber};
use crate::{BrokerError, Result, WireMessage};

/// Reply window used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Number of answered correlation IDs a responder remembers.
const ANSWER_CACHE_CAPACITY: usize = 1024;

/// A message sent with [`RequestResponder::request`] that expects a typed reply.
pub trait Request: IntegrationEvent {
    /// The reply type.
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Standard reply for requests that dispatch a command on the responder side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Validation errors, in discovery order. Empty on success.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ResponseMessage {
    /// A successful response.
    pub fn success() -> Self {
        Self::default()
    }

    /// A response carrying validation errors.
    pub fn with_errors(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when no errors were reported.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

type PendingReplies = Arc<Mutex<HashMap<Uuid, oneshot::Sender<WireMessage>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a pending reply slot when the waiting request finishes or is dropped.
struct PendingGuard {
    pending: PendingReplies,
    correlation_id: Uuid,
}

impl PendingGuard {
    fn register(
        pending: &PendingReplies,
        correlation_id: Uuid,
    ) -> (Self, oneshot::Receiver<WireMessage>) {
        let (tx, rx) = oneshot::channel();
        lock(pending).insert(correlation_id, tx);
        let guard = Self {
            pending: Arc::clone(pending),
            correlation_id,
        };
        (guard, rx)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.correlation_id);
    }
}

/// Requester and responder for correlated request/reply messaging.
pub struct RequestResponder {
    connection: Arc<ConnectionManager>,
    subscriber: Subscriber,
    timeout: Duration,
    reply_topic: String,
    pending: PendingReplies,
    listener_gate: tokio::sync::Mutex<()>,
}

impl RequestResponder {
    /// Creates a requester/responder with the given reply window.
    pub fn new(connection: Arc<ConnectionManager>, timeout: Duration) -> Self {
        Self {
            subscriber: Subscriber::new(Arc::clone(&connection)),
            connection,
            timeout,
            reply_topic: format!("reply.{}", Uuid::new_v4().simple()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            listener_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the reply window applied to each attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the IDs of running responder and reply-listener subscriptions.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.subscriber.active_subscriptions()
    }

    /// Returns the number of requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Sends a request and waits for its typed reply.
    ///
    /// Each attempt waits up to the configured window. Timed-out attempts are
    /// retried with the connection retry policy; when all attempts time out the
    /// call fails with [`BrokerError::RequestTimeout`] naming the window.
    /// Dropping the returned future abandons the pending reply.
    #[tracing::instrument(skip(self, request), fields(topic = %R::topic()))]
    pub async fn request<R: Request>(&self, request: &R) -> Result<R::Response> {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();

        let outcome = self
            .connection
            .policy()
            .execute_when("broker.request", BrokerError::is_timeout, |attempt| {
                self.request_once(request, correlation_id, attempt)
            })
            .await;

        metrics::histogram!("broker_request_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(response) => Ok(response),
            Err(failure) if failure.error.is_timeout() => {
                metrics::counter!("broker_request_timeouts_total").increment(1);
                Err(BrokerError::RequestTimeout {
                    window: self.timeout,
                    attempts: failure.attempts,
                })
            }
            Err(failure) => Err(failure.error),
        }
    }

    async fn request_once<R: Request>(
        &self,
        request: &R,
        correlation_id: Uuid,
        attempt: u32,
    ) -> Result<R::Response> {
        let connection = self.connection.ensure_connected().await?;
        self.ensure_reply_listener().await?;

        let mut message = WireMessage::new(R::topic(), request)?;
        message.correlation_id = Some(correlation_id);
        message.reply_to = Some(self.reply_topic.clone());

        let (_guard, reply) = PendingGuard::register(&self.pending, correlation_id);
        connection.publish(message).await?;
        tracing::debug!(%correlation_id, attempt, "request sent");

        let reply = match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(BrokerError::ConnectionClosed),
            Err(_) => {
                tracing::warn!(%correlation_id, attempt, "no reply within window");
                return Err(BrokerError::RequestTimeout {
                    window: self.timeout,
                    attempts: attempt,
                });
            }
        };

        if let Some(error) = reply.error() {
            return Err(BrokerError::Remote(error.to_string()));
        }
        reply.decode()
    }

    async fn ensure_reply_listener(&self) -> Result<()> {
        let _gate = self.listener_gate.lock().await;
        if self.subscriber.is_active(&self.reply_topic) {
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        self.subscriber
            .subscribe_raw(&self.reply_topic, &self.reply_topic, move |reply| {
                let pending = Arc::clone(&pending);
                async move {
                    let Some(correlation_id) = reply.correlation_id else {
                        return Err(HandlerError::from("reply without correlation id"));
                    };
                    let waiter = lock(&pending).remove(&correlation_id);
                    match waiter {
                        Some(tx) => {
                            if tx.send(reply).is_err() {
                                tracing::debug!(%correlation_id, "requester gone before reply");
                            }
                        }
                        None => tracing::debug!(%correlation_id, "late or duplicate reply ignored"),
                    }
                    Ok::<(), HandlerError>(())
                }
            })
            .await
    }

    /// Registers a responder computing `R::Response` from `R`.
    ///
    /// All responders for one request type share a consumer group, so each
    /// request is answered once. A request repeated with the same correlation
    /// ID is answered with the cached reply instead of running the handler
    /// again. Handler errors are relayed to the requester as
    /// [`BrokerError::Remote`].
    #[tracing::instrument(skip(self, handler), fields(topic = %R::topic()))]
    pub async fn respond<R, H, Fut>(&self, handler: H) -> Result<()>
    where
        R: Request,
        H: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R::Response, HandlerError>> + Send + 'static,
    {
        let topic = R::topic();
        let subscription_id = format!("responder.{topic}");
        let responder = Arc::new(Responder {
            handler,
            connection: Arc::clone(&self.connection),
            answers: Mutex::new(AnswerCache::new(ANSWER_CACHE_CAPACITY)),
        });

        self.subscriber
            .subscribe_raw(&topic, &subscription_id, move |message| {
                let responder = Arc::clone(&responder);
                async move { responder.answer::<R, _>(message).await }
            })
            .await
    }

    /// Stops answering requests of type `R`.
    pub async fn stop_responding<R: Request>(&self) -> bool {
        self.subscriber
            .unsubscribe(&format!("responder.{}", R::topic()))
            .await
    }
}

type Answer = std::result::Result<serde_json::Value, String>;

struct Responder<H> {
    handler: H,
    connection: Arc<ConnectionManager>,
    answers: Mutex<AnswerCache>,
}

impl<H> Responder<H> {
    async fn answer<R, Fut>(&self, message: WireMessage) -> std::result::Result<(), HandlerError>
    where
        R: Request,
        H: Fn(R) -> Fut,
        Fut: Future<Output = std::result::Result<R::Response, HandlerError>>,
    {
        let (Some(correlation_id), Some(reply_to)) =
            (message.correlation_id, message.reply_to.as_deref())
        else {
            return Err(HandlerError::from(
                "request without correlation id or reply topic",
            ));
        };

        let cached = lock(&self.answers).get(&correlation_id);
        let answer = match cached {
            Some(answer) => {
                tracing::debug!(%correlation_id, "duplicate request answered from cache");
                answer
            }
            None => {
                let answer = self.compute::<R, Fut>(&message).await;
                lock(&self.answers).insert(correlation_id, answer.clone());
                answer
            }
        };

        let mut reply = match &answer {
            Ok(payload) => WireMessage::new(reply_to, payload)?,
            Err(error) => {
                let mut reply = WireMessage::new(reply_to, &serde_json::Value::Null)?;
                reply.headers.insert(ERROR_HEADER.to_string(), error.clone());
                reply
            }
        };
        reply.message_id = MessageId::new();
        reply.message_type = short_type_name::<R::Response>().to_string();
        reply.correlation_id = Some(correlation_id);
        reply.persistent = false;

        let connection = self.connection.ensure_connected().await?;
        connection.publish(reply).await?;
        Ok(())
    }

    async fn compute<R, Fut>(&self, message: &WireMessage) -> Answer
    where
        R: Request,
        H: Fn(R) -> Fut,
        Fut: Future<Output = std::result::Result<R::Response, HandlerError>>,
    {
        let request: R = message.decode().map_err(|e| e.to_string())?;
        let response = (self.handler)(request).await.map_err(|e| {
            tracing::warn!(error = %e, "responder handler failed");
            e.to_string()
        })?;
        serde_json::to_value(&response).map_err(|e| e.to_string())
    }
}

/// Bounded map of correlation ID to answer; the oldest entry is evicted first.
struct AnswerCache {
    capacity: usize,
    order: VecDeque<Uuid>,
    answers: HashMap<Uuid, Answer>,
}

impl AnswerCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            answers: HashMap::with_capacity(capacity),
        }
    }

    fn get(&self, correlation_id: &Uuid) -> Option<Answer> {
        self.answers.get(correlation_id).cloned()
    }

    fn insert(&mut self, correlation_id: Uuid, answer: Answer) {
        if self.answers.insert(correlation_id, answer).is_none() {
            self.order.push_back(correlation_id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.answers.remove(&oldest);
            }
        }
    }
}
