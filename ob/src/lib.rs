//! opbridge - build operation notification bridge
//!
//! opbridge observes a running build's operation tree (a hierarchy of
//! started/progress/finished events for tasks, plugin application, dependency
//! resolution and so on) and republishes it as a simpler stream of
//! notifications to any number of independent observers.
//!
//! # Core Concepts
//!
//! - **Interesting operations**: only operations with details are exposed;
//!   transparent ones are skipped and their children re-parented to the
//!   nearest interesting ancestor
//! - **Owner attribution**: progress is reported against the nearest active
//!   operation, so sub-steps surface under something observers know
//! - **Pairing**: every Started notification gets exactly one Finished
//! - **Composition**: registering an observer never displaces another one
//! - **Per-build lifecycle**: a bridge replays what the source buffered, then
//!   detaches itself when the root operation finishes
//!
//! # Modules
//!
//! - [`domain`] - identifiers, raw events and notifications
//! - [`registry`] - concurrent parent/active bookkeeping
//! - [`engine`] - the correlation engine
//! - [`observer`] - observer trait, composite fan-out, registrar, samples
//! - [`source`] - upstream listener/source traits and the in-memory hub
//! - [`lifecycle`] - attach, replay and detach
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod observer;
pub mod registry;
pub mod source;

// Re-export commonly used types
pub use config::Config;
pub use domain::{
    FinishEvent, FinishedNotification, ListenerId, Notification, OperationDescriptor, OperationFailure, OperationId,
    ProgressEvent, ProgressNotification, StartEvent, StartedNotification,
};
pub use engine::{CorrelationEngine, EngineStatsSnapshot, RootFinishedHook};
pub use error::{AttachError, EngineError, ObserverError};
pub use lifecycle::{Attachment, attach};
pub use observer::{CollectingObserver, CompositeObserver, ConsoleObserver, Observer, ObserverRegistrar};
pub use registry::{OperationRegistry, RegistrySnapshot};
pub use source::{
    BridgeBuilder, ContractViolation, ListenerHub, OperationListener, OperationSource, Replay, SourceEvent, check_ordering,
    read_event_log,
};
