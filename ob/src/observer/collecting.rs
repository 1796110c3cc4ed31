//! In-memory observer that keeps every notification it receives

use parking_lot::Mutex;

use crate::domain::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
use crate::error::ObserverError;

use super::Observer;

/// Thread-safe buffer of received notifications, in arrival order
#[derive(Debug, Default)]
pub struct CollectingObserver {
    name: String,
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::named("collector")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Copy of everything received so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }

    fn push(&self, notification: Notification) -> Result<(), ObserverError> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}

impl Observer for CollectingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn started(&self, notification: &StartedNotification) -> Result<(), ObserverError> {
        self.push(notification.clone().into())
    }

    fn progress(&self, notification: &ProgressNotification) -> Result<(), ObserverError> {
        self.push(notification.clone().into())
    }

    fn finished(&self, notification: &FinishedNotification) -> Result<(), ObserverError> {
        self.push(notification.clone().into())
    }
}
