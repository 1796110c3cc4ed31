//! Lifecycle Controller - attach a bridge for one build and detach it afterwards
//!
//! # Data Flow
//! ```text
//! attach():
//!     source holds events → deliver buffered notifications → seed engine
//!         → register engine → source releases events
//!
//! root operation finished:
//!     engine hook → DetachGuard::fire (first call only) → remove listener
//!         → source starts recording for the next build
//! ```
//!
//! Sources live across builds in the same process, so each build gets a fresh
//! engine that removes itself once its root operation is done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::domain::{ListenerId, OperationId};
use crate::engine::CorrelationEngine;
use crate::error::AttachError;
use crate::observer::{Observer, deliver_guarded, screen_failure};
use crate::source::{OperationSource, Replay};

/// Fire-once detachment of one listener from one source
struct DetachGuard {
    source: Weak<dyn OperationSource>,
    listener_id: ListenerId,
    detached: AtomicBool,
}

impl DetachGuard {
    /// Returns true only for the call that actually detached
    fn fire(&self, reason: &str) -> bool {
        if self.detached.swap(true, Ordering::AcqRel) {
            return false;
        }
        let removed = match self.source.upgrade() {
            Some(source) => source.remove_listener(self.listener_id),
            None => false,
        };
        info!(listener = %self.listener_id, removed, reason, "bridge detached");
        true
    }
}

/// A bridge attached to an operation source for one build
pub struct Attachment {
    engine: Arc<CorrelationEngine>,
    guard: Arc<DetachGuard>,
    replayed: usize,
}

impl Attachment {
    pub fn engine(&self) -> &Arc<CorrelationEngine> {
        &self.engine
    }

    pub fn listener_id(&self) -> ListenerId {
        self.guard.listener_id
    }

    /// Number of buffered notifications delivered during attach
    pub fn replayed(&self) -> usize {
        self.replayed
    }

    pub fn is_detached(&self) -> bool {
        self.guard.detached.load(Ordering::Acquire)
    }

    /// Detach now instead of waiting for the root operation
    ///
    /// Returns false if the bridge was already detached.
    pub fn detach(&self) -> bool {
        self.guard.fire("manual")
    }
}

/// Attach a correlation engine for `observer` to `source`
///
/// Notifications the source buffered before attachment are delivered first, in
/// order, and exactly once. The source holds new events back until the engine
/// is registered, and the engine then receives live events until the first
/// root-level interesting operation finishes.
pub fn attach(source: &Arc<dyn OperationSource>, observer: Arc<dyn Observer>) -> Result<Attachment, AttachError> {
    let guard = Arc::new(DetachGuard {
        source: Arc::downgrade(source),
        listener_id: ListenerId::new(),
        detached: AtomicBool::new(false),
    });

    let mut replayed = 0;
    let build = |replay: &Replay| -> Result<Arc<CorrelationEngine>, AttachError> {
        debug!(
            replayed = replay.notifications.len(),
            observer = observer.name(),
            "attach: draining replay"
        );
        for notification in &replay.notifications {
            screen_failure(deliver_guarded(observer.as_ref(), notification), notification).map_err(|e| {
                debug!(observer = e.observer(), error = %e, %notification, "attach: fatal error during replay");
                AttachError::Replay(e)
            })?;
        }
        replayed = replay.notifications.len();

        let hook_guard = guard.clone();
        Ok(Arc::new(
            CorrelationEngine::seeded(observer.clone(), replay.snapshot.clone()).on_root_finished(
                move |id: OperationId| {
                    debug!(%id, "root operation finished");
                    hook_guard.fire("root operation finished");
                },
            ),
        ))
    };

    let engine = source.attach_bridge(guard.listener_id, Box::new(build))?;
    info!(listener = %guard.listener_id, replayed, "bridge attached");

    Ok(Attachment {
        engine,
        guard,
        replayed,
    })
}
