//! Domain types for opbridge
//!
//! Identifiers, the raw operation events reported by the upstream scheduler,
//! and the parent-resolved notifications handed to observers.

mod id;
mod notification;
mod operation;

pub use id::{ListenerId, OperationId};
pub use notification::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
pub use operation::{FinishEvent, OperationDescriptor, OperationFailure, ProgressEvent, StartEvent};
