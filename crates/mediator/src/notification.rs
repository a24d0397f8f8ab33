//! Per-unit-of-work collector of domain notifications.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::DomainNotification;

/// Ordered, append-only store of the notifications raised in one unit of work.
///
/// Safe to append to from concurrent sub-tasks of the same unit of work.
/// Never shared between units of work: each [`crate::MediatorScope`] owns one.
#[derive(Debug, Default)]
pub struct NotificationContext {
    notifications: Mutex<Vec<DomainNotification>>,
}

impl NotificationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notification. Duplicates are kept.
    pub fn add(&self, notification: DomainNotification) {
        metrics::counter!("mediator_notifications_total").increment(1);
        self.lock().push(notification);
    }

    /// Returns true once at least one notification has been added.
    pub fn has_notifications(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Returns the number of notifications recorded.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a copy of the notifications in insertion order.
    pub fn notifications(&self) -> Vec<DomainNotification> {
        self.lock().clone()
    }

    /// Returns the notification messages in insertion order.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|n| n.value().to_string()).collect()
    }

    /// Consumes the context, returning everything recorded.
    pub fn into_notifications(self) -> Vec<DomainNotification> {
        self.notifications
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DomainNotification>> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use std::sync::Arc;

    fn notification(message: &str) -> DomainNotification {
        DomainNotification::new(AggregateId::new(), "Student", message)
    }

    #[test]
    fn empty_until_first_add() {
        let context = NotificationContext::new();
        assert!(!context.has_notifications());

        context.add(notification("Name is required"));

        assert!(context.has_notifications());
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn keeps_insertion_order_and_duplicates() {
        let context = NotificationContext::new();
        for message in ["a", "b", "a", "c"] {
            context.add(notification(message));
        }

        assert_eq!(context.messages(), vec!["a", "b", "a", "c"]);
        assert_eq!(context.into_notifications().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let context = Arc::new(NotificationContext::new());

        let tasks: Vec<_> = (0..8)
            .map(|task| {
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    for i in 0..100 {
                        context.add(notification(&format!("{task}-{i}")));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(context.len(), 800);
    }
}
