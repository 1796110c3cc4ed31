//! Parent-resolved notifications delivered to observers
//!
//! `parent_id` here is the nearest *interesting* ancestor, not the upstream
//! parent; transparent operations never appear in notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OperationFailure, OperationId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedNotification {
    pub timestamp: u64,
    pub id: OperationId,
    pub parent_id: Option<OperationId>,
    pub details: Value,
}

/// Progress attributed to the nearest active operation (possibly the emitter itself)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotification {
    pub id: OperationId,
    pub timestamp: u64,
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedNotification {
    pub timestamp: u64,
    pub id: OperationId,
    pub parent_id: Option<OperationId>,
    pub details: Value,
    pub result: Option<Value>,
    pub failure: Option<OperationFailure>,
}

impl FinishedNotification {
    /// Whether this notification closes a root-level interesting operation
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Any of the three notification kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Started(StartedNotification),
    Progress(ProgressNotification),
    Finished(FinishedNotification),
}

impl Notification {
    /// The operation this notification is about
    pub fn operation_id(&self) -> OperationId {
        match self {
            Self::Started(n) => n.id,
            Self::Progress(n) => n.id,
            Self::Finished(n) => n.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started(_) => "started",
            Self::Progress(_) => "progress",
            Self::Finished(_) => "finished",
        }
    }
}

impl From<StartedNotification> for Notification {
    fn from(n: StartedNotification) -> Self {
        Self::Started(n)
    }
}

impl From<ProgressNotification> for Notification {
    fn from(n: ProgressNotification) -> Self {
        Self::Progress(n)
    }
}

impl From<FinishedNotification> for Notification {
    fn from(n: FinishedNotification) -> Self {
        Self::Finished(n)
    }
}

struct OptId(Option<OperationId>);

impl fmt::Display for OptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "null"),
        }
    }
}

impl fmt::Display for StartedNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StartedNotification{{id={}, parentId={}, timestamp={}, details={}}}",
            self.id,
            OptId(self.parent_id),
            self.timestamp,
            self.details
        )
    }
}

impl fmt::Display for ProgressNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProgressNotification{{id={}, timestamp={}, details={}}}",
            self.id, self.timestamp, self.details
        )
    }
}

impl fmt::Display for FinishedNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FinishedNotification{{id={}, parentId={}, timestamp={}, details={}, result=",
            self.id,
            OptId(self.parent_id),
            self.timestamp,
            self.details
        )?;
        match &self.result {
            Some(result) => write!(f, "{}", result)?,
            None => write!(f, "null")?,
        }
        match &self.failure {
            Some(failure) => write!(f, ", failure={}}}", failure),
            None => write!(f, ", failure=null}}"),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started(n) => fmt::Display::fmt(n, f),
            Self::Progress(n) => fmt::Display::fmt(n, f),
            Self::Finished(n) => fmt::Display::fmt(n, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_started_display() {
        let n = StartedNotification {
            timestamp: 10,
            id: OperationId::new(3),
            parent_id: Some(OperationId::new(1)),
            details: json!("leaf"),
        };
        assert_eq!(
            n.to_string(),
            r#"StartedNotification{id=3, parentId=1, timestamp=10, details="leaf"}"#
        );
    }

    #[test]
    fn test_finished_display_nulls() {
        let n = FinishedNotification {
            timestamp: 20,
            id: OperationId::new(1),
            parent_id: None,
            details: json!("root"),
            result: None,
            failure: None,
        };
        assert!(n.is_root());
        assert_eq!(
            n.to_string(),
            r#"FinishedNotification{id=1, parentId=null, timestamp=20, details="root", result=null, failure=null}"#
        );
    }

    #[test]
    fn test_notification_tagged_json() {
        let n = Notification::from(ProgressNotification {
            id: OperationId::new(3),
            timestamp: 15,
            details: json!("50%"),
        });
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["id"], 3);
        assert_eq!(n.kind(), "progress");
        assert_eq!(n.operation_id(), OperationId::new(3));
    }
}
