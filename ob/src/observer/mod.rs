//! Notification observers and fan-out
//!
//! # Architecture
//!
//! ```text
//! CorrelationEngine
//!        │
//!        ▼
//! ObserverRegistrar ──(current)──► CompositeObserver
//!                                      │
//!                    ┌─────────────────┼─────────────────┐
//!                    ▼                 ▼                 ▼
//!               observer #1       observer #2       observer #3
//!             (first registered)                  (last registered)
//! ```
//!
//! Each observer is invoked in registration order. Ordinary failures and panics
//! are logged and do not reach the next observer or the engine; only
//! [`ObserverError::Fatal`] stops delivery of the current notification and
//! propagates.

mod collecting;
mod composite;
mod console;
mod registrar;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use crate::domain::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
use crate::error::ObserverError;

pub use collecting::CollectingObserver;
pub use composite::{CompositeObserver, CompositeObserverBuilder};
pub use console::ConsoleObserver;
pub use registrar::ObserverRegistrar;

/// Downstream consumer of resolved notifications
pub trait Observer: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    fn started(&self, notification: &StartedNotification) -> Result<(), ObserverError>;

    fn progress(&self, notification: &ProgressNotification) -> Result<(), ObserverError>;

    fn finished(&self, notification: &FinishedNotification) -> Result<(), ObserverError>;

    /// Dispatch any notification kind to the matching method
    fn deliver(&self, notification: &Notification) -> Result<(), ObserverError> {
        match notification {
            Notification::Started(n) => self.started(n),
            Notification::Progress(n) => self.progress(n),
            Notification::Finished(n) => self.finished(n),
        }
    }
}

/// Deliver a notification, converting a panic into a recoverable error
pub(crate) fn deliver_guarded(observer: &dyn Observer, notification: &Notification) -> Result<(), ObserverError> {
    match catch_unwind(AssertUnwindSafe(|| observer.deliver(notification))) {
        Ok(result) => result,
        Err(payload) => Err(ObserverError::Panicked {
            observer: observer.name().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Apply the delivery policy: log and swallow recoverable failures
///
/// Fatal errors are handed back unlogged; whoever finally surfaces them logs
/// them once.
pub(crate) fn screen_failure(
    result: Result<(), ObserverError>,
    notification: &Notification,
) -> Result<(), ObserverError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!(observer = e.observer(), error = %e, %notification, "observer threw an error on notification");
            Ok(())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationId;
    use serde_json::json;

    struct Panicky;

    impl Observer for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn started(&self, _: &StartedNotification) -> Result<(), ObserverError> {
            panic!("started exploded");
        }

        fn progress(&self, _: &ProgressNotification) -> Result<(), ObserverError> {
            Ok(())
        }

        fn finished(&self, _: &FinishedNotification) -> Result<(), ObserverError> {
            Ok(())
        }
    }

    fn started() -> Notification {
        Notification::Started(StartedNotification {
            timestamp: 1,
            id: OperationId::new(1),
            parent_id: None,
            details: json!("root"),
        })
    }

    #[test]
    fn test_panic_becomes_recoverable_error() {
        let err = deliver_guarded(&Panicky, &started()).unwrap_err();
        assert!(matches!(err, ObserverError::Panicked { .. }));
        assert!(err.to_string().contains("started exploded"));
        assert!(screen_failure(Err(err), &started()).is_ok());
    }

    #[test]
    fn test_screen_failure_keeps_fatal() {
        let fatal = ObserverError::fatal("x", "out of memory");
        assert!(screen_failure(Err(fatal), &started()).unwrap_err().is_fatal());
        assert!(screen_failure(Err(ObserverError::failed("x", "oops")), &started()).is_ok());
    }
}
