//! Recorded operation event streams
//!
//! Event logs are JSONL files with one upstream event per line:
//!
//! ```text
//! {"type":"started","id":1,"details":"root","time":100}
//! {"type":"started","id":2,"parent_id":1,"time":101}
//! {"type":"progress","id":2,"details":"50%","time":150}
//! {"type":"finished","id":2,"time":190}
//! {"type":"finished","id":1,"details":"root","time":200,"result":{"ok":true}}
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{FinishEvent, OperationDescriptor, OperationFailure, OperationId, ProgressEvent, StartEvent};
use crate::error::EngineError;

use super::OperationListener;

/// One upstream operation event, as stored in an event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEvent {
    Started {
        id: OperationId,
        #[serde(default)]
        parent_id: Option<OperationId>,
        #[serde(default)]
        details: Option<Value>,
        time: u64,
    },
    Progress {
        id: OperationId,
        #[serde(default)]
        details: Option<Value>,
        time: u64,
    },
    Finished {
        id: OperationId,
        #[serde(default)]
        parent_id: Option<OperationId>,
        #[serde(default)]
        details: Option<Value>,
        time: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        failure: Option<OperationFailure>,
    },
}

impl SourceEvent {
    pub fn id(&self) -> OperationId {
        match self {
            Self::Started { id, .. } | Self::Progress { id, .. } | Self::Finished { id, .. } => *id,
        }
    }

    /// Feed this event to a listener as the live scheduler would
    pub fn dispatch(&self, listener: &dyn OperationListener) -> Result<(), EngineError> {
        match self {
            Self::Started {
                id,
                parent_id,
                details,
                time,
            } => listener.started(
                &OperationDescriptor::new(*id, *parent_id, details.clone()),
                &StartEvent::new(*time),
            ),
            Self::Progress { id, details, time } => listener.progress(*id, &ProgressEvent::new(*time, details.clone())),
            Self::Finished {
                id,
                parent_id,
                details,
                time,
                result,
                failure,
            } => listener.finished(
                &OperationDescriptor::new(*id, *parent_id, details.clone()),
                &FinishEvent {
                    end_time: *time,
                    result: result.clone(),
                    failure: failure.clone(),
                },
            ),
        }
    }
}

/// Read an event log, skipping lines that do not parse
pub fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<SourceEvent>> {
    let path = path.as_ref();
    debug!(?path, "read_event_log: reading log file");

    let content = fs::read_to_string(path).context(format!("Failed to read event log {}", path.display()))?;
    let mut events = Vec::new();

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SourceEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(line = number + 1, error = %e, "read_event_log: failed to parse line");
            }
        }
    }

    debug!(count = events.len(), "read_event_log: loaded events");
    Ok(events)
}

/// Breach of the per-operation ordering the scheduler promises
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("event {index}: operation {id} started again before finishing")]
    DuplicateStart { index: usize, id: OperationId },

    #[error("event {index}: progress for operation {id} outside its start/finish")]
    StrayProgress { index: usize, id: OperationId },

    #[error("event {index}: operation {id} finished without a matching start")]
    UnmatchedFinish { index: usize, id: OperationId },

    #[error("operation {id} never finished")]
    Unfinished { id: OperationId },
}

/// Check that every operation follows start, progress*, finish
///
/// Ids may be reused once finished. Unknown-id progress is reported even
/// though the engine tolerates it, since a recorded log should be complete.
pub fn check_ordering(events: &[SourceEvent]) -> Vec<ContractViolation> {
    let mut running: HashMap<OperationId, usize> = HashMap::new();
    let mut violations = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let id = event.id();
        match event {
            SourceEvent::Started { .. } => {
                if running.insert(id, index).is_some() {
                    violations.push(ContractViolation::DuplicateStart { index, id });
                }
            }
            SourceEvent::Progress { .. } => {
                if !running.contains_key(&id) {
                    violations.push(ContractViolation::StrayProgress { index, id });
                }
            }
            SourceEvent::Finished { .. } => {
                if running.remove(&id).is_none() {
                    violations.push(ContractViolation::UnmatchedFinish { index, id });
                }
            }
        }
    }

    let mut unfinished: Vec<(usize, OperationId)> = running.into_iter().map(|(id, index)| (index, id)).collect();
    unfinished.sort();
    violations.extend(unfinished.into_iter().map(|(_, id)| ContractViolation::Unfinished { id }));
    violations
}
