//! Durable, named subscriptions with an isolated dispatch loop.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::IntegrationEvent;
use futures_util::FutureExt;
use tokio::task::JoinHandle;

use crate::connection::ConnectionManager;
use crate::transport::{BrokerConnection, Delivery};
use crate::{Result, WireMessage};

/// Error type message handlers return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

struct ActiveSubscription {
    topic: String,
    task: JoinHandle<()>,
}

/// Registers consumers on topics and runs one dispatch loop per subscription.
///
/// A failing or panicking handler is logged and counted; the loop moves on to
/// the next message. Subscribing again under an existing `subscription_id`
/// replaces the previous registration instead of adding a second consumer.
pub struct Subscriber {
    connection: Arc<ConnectionManager>,
    active: Mutex<HashMap<String, ActiveSubscription>>,
}

impl Subscriber {
    /// Creates a subscriber sharing the given connection manager.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            connection,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes `handler` to the topic derived from `E`.
    ///
    /// Fails with [`crate::BrokerError::Unavailable`] if no connection can be
    /// established.
    #[tracing::instrument(skip(self, handler), fields(topic = %E::topic()))]
    pub async fn subscribe<E, H, Fut>(&self, subscription_id: &str, handler: H) -> Result<()>
    where
        E: IntegrationEvent,
        H: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.subscribe_raw(&E::topic(), subscription_id, move |message: WireMessage| {
            let handler = Arc::clone(&handler);
            async move {
                let event: E = message.decode()?;
                handler(event).await
            }
        })
        .await
    }

    /// Subscribes a handler receiving undecoded wire messages.
    pub async fn subscribe_raw<H, Fut>(
        &self,
        topic: &str,
        subscription_id: &str,
        handler: H,
    ) -> Result<()>
    where
        H: Fn(WireMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
    {
        if let Some(previous) = self.lock().remove(subscription_id) {
            previous.task.abort();
        }

        let epoch = self.connection.disposals();
        let connection = self.connection.ensure_connected().await?;
        let delivery = connection.subscribe(topic, subscription_id).await?;

        let dispatch = DispatchLoop {
            manager: Arc::clone(&self.connection),
            epoch,
            connection,
            topic: topic.to_string(),
            subscription_id: subscription_id.to_string(),
            handler,
        };
        let task = tokio::spawn(dispatch.run(delivery));

        self.lock().insert(
            subscription_id.to_string(),
            ActiveSubscription {
                topic: topic.to_string(),
                task,
            },
        );
        tracing::info!(subscription_id, topic, "subscribed");
        Ok(())
    }

    /// Stops a subscription. Returns false if no subscription had that ID.
    #[tracing::instrument(skip(self))]
    pub async fn unsubscribe(&self, subscription_id: &str) -> bool {
        let Some(subscription) = self.lock().remove(subscription_id) else {
            return false;
        };
        subscription.task.abort();

        // Only tell the broker if a session is already up; never connect just to unsubscribe.
        if self.connection.is_connected()
            && let Ok(connection) = self.connection.ensure_connected().await
            && let Err(e) = connection
                .unsubscribe(&subscription.topic, subscription_id)
                .await
        {
            tracing::warn!(error = %e, "broker-side unsubscribe failed");
        }
        true
    }

    /// Returns the IDs of subscriptions whose dispatch loop is still running.
    pub fn active_subscriptions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, subscription)| !subscription.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Returns true if the subscription exists and its dispatch loop is running.
    pub fn is_active(&self, subscription_id: &str) -> bool {
        self.lock()
            .get(subscription_id)
            .is_some_and(|subscription| !subscription.task.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveSubscription>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        for (_, subscription) in self.lock().drain() {
            subscription.task.abort();
        }
    }
}

struct DispatchLoop<H> {
    manager: Arc<ConnectionManager>,
    epoch: u64,
    connection: Arc<dyn BrokerConnection>,
    topic: String,
    subscription_id: String,
    handler: H,
}

impl<H, Fut> DispatchLoop<H>
where
    H: Fn(WireMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
{
    async fn run(mut self, mut delivery: Delivery) {
        loop {
            while let Some(message) = delivery.recv().await {
                self.dispatch(message).await;
            }

            if self.connection.is_open() {
                // Cancelled on the broker side, or replaced by a newer registration.
                tracing::info!(subscription_id = %self.subscription_id, "delivery stream closed");
                return;
            }

            if self.manager.disposals() != self.epoch {
                tracing::info!(
                    subscription_id = %self.subscription_id,
                    "connection disposed, subscription stopped"
                );
                return;
            }

            tracing::warn!(
                subscription_id = %self.subscription_id,
                "broker connection lost, resubscribing"
            );
            match self.resubscribe().await {
                Ok(next) => delivery = next,
                Err(e) => {
                    tracing::error!(
                        subscription_id = %self.subscription_id,
                        error = %e,
                        "could not resubscribe, subscription stopped"
                    );
                    return;
                }
            }
        }
    }

    async fn resubscribe(&mut self) -> Result<Delivery> {
        let connection = self.manager.ensure_connected().await?;
        let delivery = connection
            .subscribe(&self.topic, &self.subscription_id)
            .await?;
        self.connection = connection;
        Ok(delivery)
    }

    async fn dispatch(&self, message: WireMessage) {
        metrics::counter!("broker_messages_consumed_total").increment(1);
        let message_id = message.message_id;

        let outcome = AssertUnwindSafe(async { (self.handler)(message).await })
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
        };

        metrics::counter!("broker_handler_failures_total").increment(1);
        tracing::error!(
            subscription_id = %self.subscription_id,
            topic = %self.topic,
            %message_id,
            error = %failure,
            "message handler failed"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
