//! Correlation Engine - turns raw operation events into resolved notifications
//!
//! The engine listens to the upstream scheduler's started/progress/finished
//! events, keeps the [`OperationRegistry`] current, and forwards notifications
//! for interesting operations only:
//!
//! - started: parent resolved to the nearest interesting ancestor
//! - progress: attributed to the nearest active operation (self first)
//! - finished: only for operations that were started-notified
//!
//! Calls for different operations may arrive concurrently from any number of
//! worker threads; calls for one operation arrive in start, progress*, finish
//! order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::domain::{
    FinishEvent, FinishedNotification, Notification, OperationDescriptor, OperationId, ProgressEvent,
    ProgressNotification, StartEvent, StartedNotification,
};
use crate::error::EngineError;
use crate::observer::{Observer, deliver_guarded, screen_failure};
use crate::registry::{OperationRegistry, RegistrySnapshot};
use crate::source::OperationListener;

/// Callback run after a root-level interesting operation finishes
pub type RootFinishedHook = Box<dyn Fn(OperationId) + Send + Sync>;

pub struct CorrelationEngine {
    registry: OperationRegistry,
    observer: Arc<dyn Observer>,
    on_root_finished: Option<RootFinishedHook>,
    stats: EngineStats,
}

impl CorrelationEngine {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self::with_registry(observer, OperationRegistry::new())
    }

    /// Engine that continues from linkage tracked by an earlier bridge
    pub fn seeded(observer: Arc<dyn Observer>, snapshot: RegistrySnapshot) -> Self {
        Self::with_registry(observer, OperationRegistry::from_snapshot(snapshot))
    }

    fn with_registry(observer: Arc<dyn Observer>, registry: OperationRegistry) -> Self {
        debug!(observer = observer.name(), "CorrelationEngine::new");
        Self {
            registry,
            observer,
            on_root_finished: None,
            stats: EngineStats::default(),
        }
    }

    pub fn on_root_finished(mut self, hook: impl Fn(OperationId) + Send + Sync + 'static) -> Self {
        self.on_root_finished = Some(Box::new(hook));
        self
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn on_started(&self, descriptor: &OperationDescriptor, event: &StartEvent) -> Result<(), EngineError> {
        let id = descriptor.id;
        let parent_id = self.registry.resolve_parent_on_start(id, descriptor.parent_id);

        let Some(details) = &descriptor.details else {
            trace!(%id, ?parent_id, "on_started: transparent operation");
            return Ok(());
        };

        if self.registry.mark_active_if_interesting(id, Some(details)) {
            return Err(EngineError::DuplicateStart(id));
        }

        debug!(%id, ?parent_id, "on_started: forwarding");
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        self.forward(Notification::Started(StartedNotification {
            timestamp: event.start_time,
            id,
            parent_id,
            details: details.clone(),
        }))
    }

    pub fn on_progress(&self, id: OperationId, event: &ProgressEvent) -> Result<(), EngineError> {
        let Some(details) = &event.details else {
            return Ok(());
        };

        // Find the nearest operation up the tree that observers know about
        let Some(owner) = self.registry.find_owner(id) else {
            trace!(%id, "on_progress: no owner");
            self.stats.progress_dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        self.stats.progress.fetch_add(1, Ordering::Relaxed);
        self.forward(Notification::Progress(ProgressNotification {
            id: owner,
            timestamp: event.time,
            details: details.clone(),
        }))
    }

    pub fn on_finished(&self, descriptor: &OperationDescriptor, event: &FinishEvent) -> Result<(), EngineError> {
        let id = descriptor.id;
        // details come from the start, the finish-time descriptor may omit them
        let (parent_id, started_details) = self.registry.finish(id);
        let Some(details) = started_details else {
            trace!(%id, "on_finished: operation was never started-notified");
            return Ok(());
        };

        debug!(%id, ?parent_id, failed = event.failure.is_some(), "on_finished: forwarding");
        self.stats.finished.fetch_add(1, Ordering::Relaxed);
        let delivered = self.forward(Notification::Finished(FinishedNotification {
            timestamp: event.end_time,
            id,
            parent_id,
            details,
            result: event.result.clone(),
            failure: event.failure.clone(),
        }));

        if parent_id.is_none() {
            self.stats.roots_finished.fetch_add(1, Ordering::Relaxed);
            if let Some(hook) = &self.on_root_finished {
                debug!(%id, "on_finished: root operation finished");
                hook(id);
            }
        }
        delivered
    }

    fn forward(&self, notification: Notification) -> Result<(), EngineError> {
        let result = deliver_guarded(self.observer.as_ref(), &notification);
        if result.is_err() {
            self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
        }
        screen_failure(result, &notification).map_err(|e| {
            debug!(observer = e.observer(), error = %e, %notification, "fatal observer error");
            EngineError::Observer(e)
        })
    }
}

impl OperationListener for CorrelationEngine {
    fn started(&self, descriptor: &OperationDescriptor, event: &StartEvent) -> Result<(), EngineError> {
        self.on_started(descriptor, event)
    }

    fn progress(&self, id: OperationId, event: &ProgressEvent) -> Result<(), EngineError> {
        self.on_progress(id, event)
    }

    fn finished(&self, descriptor: &OperationDescriptor, event: &FinishEvent) -> Result<(), EngineError> {
        self.on_finished(descriptor, event)
    }
}

/// Notification counters, updated without locking
#[derive(Debug, Default)]
struct EngineStats {
    started: AtomicU64,
    progress: AtomicU64,
    progress_dropped: AtomicU64,
    finished: AtomicU64,
    roots_finished: AtomicU64,
    delivery_failures: AtomicU64,
}

impl EngineStats {
    fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            progress: self.progress.load(Ordering::Relaxed),
            progress_dropped: self.progress_dropped.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            roots_finished: self.roots_finished.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub started: u64,
    pub progress: u64,
    /// Progress with details but no interesting owner
    pub progress_dropped: u64,
    pub finished: u64,
    pub roots_finished: u64,
    /// Observer failures, fatal or not
    pub delivery_failures: u64,
}
