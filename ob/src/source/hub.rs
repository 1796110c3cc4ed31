//! In-memory operation source
//!
//! Broadcasts operation events to attached listeners in registration order.
//! Whenever no bridge is attached, the hub also runs its own recording engine
//! so that notifications for operations started before the next bridge
//! attaches are not lost. Removing the bridge re-arms recording, so one hub
//! serves any number of builds.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{FinishEvent, ListenerId, OperationDescriptor, OperationId, ProgressEvent, StartEvent};
use crate::engine::CorrelationEngine;
use crate::error::{AttachError, EngineError};
use crate::observer::CollectingObserver;

use super::{BridgeBuilder, OperationListener, OperationSource, Replay};

struct Recorder {
    engine: CorrelationEngine,
    buffer: Arc<CollectingObserver>,
}

impl Recorder {
    fn new() -> Self {
        let buffer = Arc::new(CollectingObserver::named("replay-buffer"));
        Self {
            engine: CorrelationEngine::new(buffer.clone()),
            buffer,
        }
    }

    fn replay(&self) -> Replay {
        Replay {
            notifications: self.buffer.notifications(),
            snapshot: self.engine.registry().snapshot(),
        }
    }
}

#[derive(Default)]
struct HubState {
    listeners: Vec<(ListenerId, Arc<dyn OperationListener>)>,
    // None exactly while a bridge is attached
    recorder: Option<Recorder>,
    bridge: Option<ListenerId>,
}

pub struct ListenerHub {
    state: RwLock<HubState>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HubState {
                recorder: Some(Recorder::new()),
                ..HubState::default()
            }),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.read().listeners.len()
    }

    /// Whether events are being recorded for a future bridge
    pub fn is_recording(&self) -> bool {
        self.state.read().recorder.is_some()
    }

    /// Record and broadcast one event
    ///
    /// Recording and copying the listener list share one read lock, so a
    /// bridge handover sees every event exactly once: in its replay or live.
    /// Delivery runs without the lock so listeners may detach themselves.
    fn relay(
        &self,
        record: impl FnOnce(&CorrelationEngine) -> Result<(), EngineError>,
        deliver: impl Fn(&dyn OperationListener) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let (recorded, listeners) = {
            let state = self.state.read();
            let recorded = match &state.recorder {
                Some(recorder) => record(&recorder.engine),
                None => Ok(()),
            };
            let listeners: Vec<Arc<dyn OperationListener>> = state.listeners.iter().map(|(_, l)| l.clone()).collect();
            (recorded, listeners)
        };

        for listener in listeners {
            deliver(listener.as_ref())?;
        }
        recorded
    }
}

impl Default for ListenerHub {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationListener for ListenerHub {
    fn started(&self, descriptor: &OperationDescriptor, event: &StartEvent) -> Result<(), EngineError> {
        self.relay(
            |recorder| recorder.on_started(descriptor, event),
            |listener| listener.started(descriptor, event),
        )
    }

    fn progress(&self, id: OperationId, event: &ProgressEvent) -> Result<(), EngineError> {
        self.relay(
            |recorder| recorder.on_progress(id, event),
            |listener| listener.progress(id, event),
        )
    }

    fn finished(&self, descriptor: &OperationDescriptor, event: &FinishEvent) -> Result<(), EngineError> {
        self.relay(
            |recorder| recorder.on_finished(descriptor, event),
            |listener| listener.finished(descriptor, event),
        )
    }
}

impl OperationSource for ListenerHub {
    fn add_listener(&self, id: ListenerId, listener: Arc<dyn OperationListener>) {
        let mut state = self.state.write();
        state.listeners.push((id, listener));
        info!(%id, total = state.listeners.len(), "ListenerHub::add_listener");
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.write();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        let removed = state.listeners.len() != before;

        if state.bridge == Some(id) {
            state.bridge = None;
            state.recorder = Some(Recorder::new());
            debug!(%id, "ListenerHub::remove_listener: bridge gone, recording re-armed");
        }
        info!(%id, removed, total = state.listeners.len(), "ListenerHub::remove_listener");
        removed
    }

    fn attach_bridge(&self, id: ListenerId, build: BridgeBuilder<'_>) -> Result<Arc<CorrelationEngine>, AttachError> {
        let mut state = self.state.write();
        let recorder = state.recorder.take().ok_or(AttachError::AlreadyAttached)?;

        let replay = recorder.replay();
        debug!(
            notifications = replay.notifications.len(),
            active = replay.snapshot.active.len(),
            "ListenerHub::attach_bridge: handing over replay"
        );

        match build(&replay) {
            Ok(engine) => {
                let listener: Arc<dyn OperationListener> = engine.clone();
                state.listeners.push((id, listener));
                state.bridge = Some(id);
                info!(%id, total = state.listeners.len(), "ListenerHub::attach_bridge");
                Ok(engine)
            }
            Err(e) => {
                state.recorder = Some(recorder);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::Notification;
    use serde_json::json;

    fn root() -> OperationDescriptor {
        OperationDescriptor::new(1, None, Some(json!("root")))
    }

    /// Attach a bridge feeding `collector`, returning the replay length
    fn bridge(hub: &ListenerHub, id: ListenerId, collector: &Arc<CollectingObserver>) -> Result<usize, AttachError> {
        let mut replayed = 0;
        hub.attach_bridge(
            id,
            Box::new(|replay: &Replay| -> Result<Arc<CorrelationEngine>, AttachError> {
                replayed = replay.notifications.len();
                Ok(Arc::new(CorrelationEngine::seeded(
                    collector.clone(),
                    replay.snapshot.clone(),
                )))
            }),
        )?;
        Ok(replayed)
    }

    #[test]
    fn test_records_until_bridge_attaches() {
        let hub = ListenerHub::new();
        hub.started(&root(), &StartEvent::new(1)).unwrap();
        assert!(hub.is_recording());

        let mut seen = Vec::new();
        hub.attach_bridge(
            ListenerId::new(),
            Box::new(|replay: &Replay| -> Result<Arc<CorrelationEngine>, AttachError> {
                seen = replay.notifications.clone();
                assert!(replay.snapshot.active.contains_key(&OperationId::new(1)));
                Ok(Arc::new(CorrelationEngine::seeded(
                    Arc::new(CollectingObserver::new()),
                    replay.snapshot.clone(),
                )))
            }),
        )
        .unwrap();

        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Notification::Started(_)));
        assert!(!hub.is_recording());
        assert_eq!(hub.listener_count(), 1);

        let second = bridge(&hub, ListenerId::new(), &Arc::new(CollectingObserver::new()));
        assert!(matches!(second, Err(AttachError::AlreadyAttached)));
    }

    #[test]
    fn test_removing_bridge_rearms_recording() {
        let hub = ListenerHub::new();
        let first = ListenerId::new();
        let collector = Arc::new(CollectingObserver::new());
        assert_eq!(bridge(&hub, first, &collector).unwrap(), 0);

        hub.started(&root(), &StartEvent::new(1)).unwrap();
        assert_eq!(collector.len(), 1);

        assert!(hub.remove_listener(first));
        assert!(hub.is_recording());

        // next build starts before its bridge attaches
        hub.started(&root(), &StartEvent::new(2)).unwrap();
        let next = Arc::new(CollectingObserver::new());
        assert_eq!(bridge(&hub, ListenerId::new(), &next).unwrap(), 1);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_failed_build_keeps_buffer() {
        let hub = ListenerHub::new();
        hub.started(&root(), &StartEvent::new(1)).unwrap();

        let failed = hub.attach_bridge(
            ListenerId::new(),
            Box::new(|_: &Replay| -> Result<Arc<CorrelationEngine>, AttachError> {
                Err(AttachError::AlreadyAttached)
            }),
        );
        assert!(failed.is_err());
        assert!(hub.is_recording());
        assert_eq!(hub.listener_count(), 0);

        let collector = Arc::new(CollectingObserver::new());
        assert_eq!(bridge(&hub, ListenerId::new(), &collector).unwrap(), 1);
    }

    #[test]
    fn test_plain_listener_removal_keeps_bridge() {
        let hub = ListenerHub::new();
        let plain = ListenerId::new();
        hub.add_listener(plain, Arc::new(CorrelationEngine::new(Arc::new(CollectingObserver::new()))));
        bridge(&hub, ListenerId::new(), &Arc::new(CollectingObserver::new())).unwrap();

        assert!(hub.remove_listener(plain));
        assert!(!hub.remove_listener(plain));
        assert!(!hub.is_recording());
        assert_eq!(hub.listener_count(), 1);
    }

    /// Counts started events it receives
    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
    }

    impl OperationListener for Counter {
        fn started(&self, _: &OperationDescriptor, _: &StartEvent) -> Result<(), EngineError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn progress(&self, _: OperationId, _: &ProgressEvent) -> Result<(), EngineError> {
            Ok(())
        }

        fn finished(&self, _: &OperationDescriptor, _: &FinishEvent) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn test_recording_error_does_not_stop_broadcast() {
        let hub = ListenerHub::new();
        let counter = Arc::new(Counter::default());
        hub.add_listener(ListenerId::new(), counter.clone());

        hub.started(&root(), &StartEvent::new(1)).unwrap();
        // the recording engine rejects the second start of a running id
        let err = hub.started(&root(), &StartEvent::new(2)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateStart(_)));
        assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    }

    /// Detaches itself from the hub while handling an event
    struct SelfRemoving {
        hub: Arc<ListenerHub>,
        id: ListenerId,
    }

    impl OperationListener for SelfRemoving {
        fn started(&self, _: &OperationDescriptor, _: &StartEvent) -> Result<(), EngineError> {
            self.hub.remove_listener(self.id);
            Ok(())
        }

        fn progress(&self, _: OperationId, _: &ProgressEvent) -> Result<(), EngineError> {
            Ok(())
        }

        fn finished(&self, _: &OperationDescriptor, _: &FinishEvent) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn test_listener_can_remove_itself_during_delivery() {
        let hub = Arc::new(ListenerHub::new());
        let id = ListenerId::new();
        hub.add_listener(id, Arc::new(SelfRemoving { hub: hub.clone(), id }));

        hub.started(&root(), &StartEvent::new(1)).unwrap();
        assert_eq!(hub.listener_count(), 0);
    }
}
