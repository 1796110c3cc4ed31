//! Raw operation events as reported by the upstream scheduler

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OperationId;

/// Upstream record for an operation
///
/// The same descriptor accompanies the start and the finish of an operation.
/// Operations with `details` are the ones observers care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub id: OperationId,
    #[serde(default)]
    pub parent_id: Option<OperationId>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl OperationDescriptor {
    pub fn new(id: impl Into<OperationId>, parent_id: Option<OperationId>, details: Option<Value>) -> Self {
        Self {
            id: id.into(),
            parent_id,
            details,
        }
    }

    /// Whether this operation carries observable details
    pub fn is_interesting(&self) -> bool {
        self.details.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
    pub start_time: u64,
}

impl StartEvent {
    pub fn new(start_time: u64) -> Self {
        Self { start_time }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub time: u64,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ProgressEvent {
    pub fn new(time: u64, details: Option<Value>) -> Self {
        Self { time, details }
    }
}

/// Completion of an operation
///
/// A failure does not imply the absence of a result; both may be present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinishEvent {
    pub end_time: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub failure: Option<OperationFailure>,
}

impl FinishEvent {
    pub fn succeeded(end_time: u64, result: Option<Value>) -> Self {
        Self {
            end_time,
            result,
            failure: None,
        }
    }

    pub fn failed(end_time: u64, failure: OperationFailure) -> Self {
        Self {
            end_time,
            result: None,
            failure: Some(failure),
        }
    }
}

/// Opaque failure value reported by the upstream scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub message: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl OperationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{}: {}", kind, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_interesting() {
        assert!(OperationDescriptor::new(1, None, Some(json!("root"))).is_interesting());
        assert!(!OperationDescriptor::new(2, Some(OperationId::new(1)), None).is_interesting());
    }

    #[test]
    fn test_failure_display() {
        let failure = OperationFailure::new("compilation failed").with_kind("TaskExecutionException");
        assert_eq!(failure.to_string(), "TaskExecutionException: compilation failed");
        assert_eq!(OperationFailure::new("boom").to_string(), "boom");
    }
}
