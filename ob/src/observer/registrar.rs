//! Shared registration point for observers
//!
//! Registering never replaces an earlier observer: each registration builds a
//! new composite (existing observers first, the new one last) and swaps it in
//! whole. In-flight deliveries keep using the composite they started with.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
use crate::error::ObserverError;

use super::{CompositeObserver, Observer};

#[derive(Debug, Default)]
pub struct ObserverRegistrar {
    current: RwLock<Arc<CompositeObserver>>,
}

impl ObserverRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer after every observer registered so far
    pub fn register(&self, observer: Arc<dyn Observer>) {
        let mut current = self.current.write();
        let name = observer.name().to_string();
        let composite = CompositeObserver::builder().extend_from(&current).with(observer).build();
        info!(observer = %name, total = composite.len(), "ObserverRegistrar::register");
        *current = Arc::new(composite);
    }

    /// The composite currently receiving notifications
    pub fn current(&self) -> Arc<CompositeObserver> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    fn dispatch(&self, notification: &Notification) -> Result<(), ObserverError> {
        // release the lock before delivering so observers may register others
        let composite = self.current();
        if composite.is_empty() {
            debug!(kind = notification.kind(), "ObserverRegistrar: no observers registered");
            return Ok(());
        }
        composite.deliver(notification)
    }
}

impl Observer for ObserverRegistrar {
    fn name(&self) -> &str {
        "registrar"
    }

    fn started(&self, notification: &StartedNotification) -> Result<(), ObserverError> {
        self.dispatch(&Notification::Started(notification.clone()))
    }

    fn progress(&self, notification: &ProgressNotification) -> Result<(), ObserverError> {
        self.dispatch(&Notification::Progress(notification.clone()))
    }

    fn finished(&self, notification: &FinishedNotification) -> Result<(), ObserverError> {
        self.dispatch(&Notification::Finished(notification.clone()))
    }

    fn deliver(&self, notification: &Notification) -> Result<(), ObserverError> {
        self.dispatch(notification)
    }
}
