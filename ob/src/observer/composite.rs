//! Composite observer - ordered fan-out to several observers

use std::fmt;
use std::sync::Arc;

use crate::domain::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
use crate::error::ObserverError;

use super::{Observer, deliver_guarded, screen_failure};

/// Fixed, ordered set of observers that behaves as a single observer
///
/// Built once through [`CompositeObserver::builder`] and never modified; adding
/// an observer means building a new composite.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn Observer>>,
}

impl CompositeObserver {
    pub fn builder() -> CompositeObserverBuilder {
        CompositeObserverBuilder::default()
    }

    pub fn observers(&self) -> &[Arc<dyn Observer>] {
        &self.observers
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver to every observer in order
    ///
    /// Recoverable failures are logged and skipped; a fatal failure stops
    /// delivery to the remaining observers and is returned.
    fn fan_out(&self, notification: &Notification) -> Result<(), ObserverError> {
        for observer in &self.observers {
            screen_failure(deliver_guarded(observer.as_ref(), notification), notification)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.observers.iter().map(|o| o.name()).collect();
        f.debug_struct("CompositeObserver").field("observers", &names).finish()
    }
}

impl Observer for CompositeObserver {
    fn name(&self) -> &str {
        "composite"
    }

    fn started(&self, notification: &StartedNotification) -> Result<(), ObserverError> {
        self.fan_out(&Notification::Started(notification.clone()))
    }

    fn progress(&self, notification: &ProgressNotification) -> Result<(), ObserverError> {
        self.fan_out(&Notification::Progress(notification.clone()))
    }

    fn finished(&self, notification: &FinishedNotification) -> Result<(), ObserverError> {
        self.fan_out(&Notification::Finished(notification.clone()))
    }

    fn deliver(&self, notification: &Notification) -> Result<(), ObserverError> {
        self.fan_out(notification)
    }
}

#[derive(Default)]
pub struct CompositeObserverBuilder {
    observers: Vec<Arc<dyn Observer>>,
}

impl CompositeObserverBuilder {
    /// Append an observer after the ones already added
    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Append every member of an existing composite, keeping their order
    pub fn extend_from(mut self, composite: &CompositeObserver) -> Self {
        self.observers.extend(composite.observers.iter().cloned());
        self
    }

    pub fn build(self) -> CompositeObserver {
        CompositeObserver {
            observers: self.observers,
        }
    }
}
