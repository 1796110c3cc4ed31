//! Upstream operation sources
//!
//! The host scheduler is outside this crate. It is seen only through two traits:
//! [`OperationListener`] (what it calls for every operation event) and
//! [`OperationSource`] (where listeners are attached and detached, and where a
//! bridge takes over the notifications buffered before it attached).
//!
//! [`ListenerHub`] is an in-memory source used by the `ob` binary and tests;
//! [`read_event_log`] loads recorded event streams to play into it.

mod hub;
mod playback;

use std::sync::Arc;

use crate::domain::{
    FinishEvent, ListenerId, Notification, OperationDescriptor, OperationId, ProgressEvent, StartEvent,
};
use crate::engine::CorrelationEngine;
use crate::error::{AttachError, EngineError};
use crate::registry::RegistrySnapshot;

pub use hub::ListenerHub;
pub use playback::{ContractViolation, SourceEvent, check_ordering, read_event_log};

/// Receiver of raw operation events
pub trait OperationListener: Send + Sync {
    fn started(&self, descriptor: &OperationDescriptor, event: &StartEvent) -> Result<(), EngineError>;

    fn progress(&self, id: OperationId, event: &ProgressEvent) -> Result<(), EngineError>;

    fn finished(&self, descriptor: &OperationDescriptor, event: &FinishEvent) -> Result<(), EngineError>;
}

/// Notifications recorded before a bridge attached, plus the linkage needed to continue
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub notifications: Vec<Notification>,
    pub snapshot: RegistrySnapshot,
}

/// Builds the bridge engine from a replay while the source holds events back
pub type BridgeBuilder<'a> = Box<dyn FnOnce(&Replay) -> Result<Arc<CorrelationEngine>, AttachError> + 'a>;

/// Registration point exposed by the upstream scheduler
///
/// A source is long-lived: it serves one bridge per build, recording in between.
pub trait OperationSource: Send + Sync {
    fn add_listener(&self, id: ListenerId, listener: Arc<dyn OperationListener>);

    /// Returns false if no listener was registered under `id`
    ///
    /// Removing the current bridge re-arms recording for the next one.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Hand the pre-attachment buffer to `build` and register what it returns
    /// under `id`, with no event slipping between the two
    ///
    /// Fails with [`AttachError::AlreadyAttached`] while another bridge is
    /// registered. If `build` fails the buffer is kept for the next attempt.
    fn attach_bridge(&self, id: ListenerId, build: BridgeBuilder<'_>) -> Result<Arc<CorrelationEngine>, AttachError>;
}
