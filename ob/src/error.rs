//! Error types for the bridge

use thiserror::Error;

use crate::domain::OperationId;

/// Errors raised by an observer while handling a notification
#[derive(Debug, Clone, Error)]
pub enum ObserverError {
    #[error("Observer {observer} failed: {message}")]
    Failed { observer: String, message: String },

    #[error("Observer {observer} hit an unrecoverable error: {message}")]
    Fatal { observer: String, message: String },

    #[error("Observer {observer} panicked: {message}")]
    Panicked { observer: String, message: String },
}

impl ObserverError {
    pub fn failed(observer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            observer: observer.into(),
            message: message.into(),
        }
    }

    pub fn fatal(observer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            observer: observer.into(),
            message: message.into(),
        }
    }

    /// Fatal errors must propagate out of the engine; everything else is logged and dropped
    pub fn is_fatal(&self) -> bool {
        matches!(self, ObserverError::Fatal { .. })
    }

    pub fn observer(&self) -> &str {
        match self {
            ObserverError::Failed { observer, .. }
            | ObserverError::Fatal { observer, .. }
            | ObserverError::Panicked { observer, .. } => observer,
        }
    }
}

/// Errors propagated from the correlation engine back to the upstream source
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Fatal observer error: {0}")]
    Observer(#[source] ObserverError),

    #[error("Operation {0} started twice without finishing")]
    DuplicateStart(OperationId),
}

/// Errors raised while attaching a bridge to an operation source
#[derive(Debug, Clone, Error)]
pub enum AttachError {
    #[error("Operation source already has a notification bridge attached")]
    AlreadyAttached,

    #[error("Replay of buffered notifications failed: {0}")]
    Replay(#[source] ObserverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fatal_is_fatal() {
        assert!(ObserverError::fatal("console", "out of memory").is_fatal());
        assert!(!ObserverError::failed("console", "broken pipe").is_fatal());
        let panicked = ObserverError::Panicked {
            observer: "console".to_string(),
            message: "index out of bounds".to_string(),
        };
        assert!(!panicked.is_fatal());
        assert_eq!(panicked.observer(), "console");
    }

    #[test]
    fn test_engine_error_messages() {
        let err = EngineError::DuplicateStart(OperationId::new(7));
        assert!(err.to_string().contains('7'));

        let err = EngineError::Observer(ObserverError::fatal("scan", "disk gone"));
        let msg = err.to_string();
        assert!(msg.contains("scan"));
        assert!(msg.contains("disk gone"));
    }
}
