//! Operation Registry - live parent linkage and "interesting" tracking
//!
//! Two concurrent maps keyed by operation id:
//! - `parents`: the nearest interesting ancestor resolved when an operation started
//! - `active`: interesting operations that have started but not finished, with
//!   the details they started with
//!
//! Each call touches one key at a time and never holds a guard on one map while
//! accessing the other, so unrelated operations on parallel worker threads only
//! contend when they hash to the same shard.

use std::collections::HashMap;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tracing::trace;

use crate::domain::OperationId;

/// Copy of the registry state
///
/// Used to seed a fresh registry with the linkage an earlier bridge tracked for
/// operations that are still running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub parents: HashMap<OperationId, OperationId>,
    pub active: HashMap<OperationId, Value>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.active.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    parents: DashMap<OperationId, OperationId>,
    active: DashMap<OperationId, Value>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let registry = Self::new();
        for (id, parent) in snapshot.parents {
            registry.parents.insert(id, parent);
        }
        for (id, details) in snapshot.active {
            registry.active.insert(id, details);
        }
        registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            parents: self.parents.iter().map(|e| (*e.key(), *e.value())).collect(),
            active: self.active.iter().map(|e| (*e.key(), e.value().clone())).collect(),
        }
    }

    /// Resolve the nearest interesting ancestor of a starting operation
    ///
    /// An active declared parent is the answer; otherwise whatever the declared
    /// parent itself resolved to. Nothing is recorded when neither exists.
    pub fn resolve_parent_on_start(&self, id: OperationId, declared_parent: Option<OperationId>) -> Option<OperationId> {
        let declared = declared_parent?;

        let resolved = if self.active.contains_key(&declared) {
            Some(declared)
        } else {
            self.parents.get(&declared).map(|entry| *entry.value())
        };

        if let Some(parent) = resolved {
            self.parents.insert(id, parent);
        }
        trace!(%id, %declared, ?resolved, "resolve_parent_on_start");
        resolved
    }

    /// Record an operation that started with details as active
    ///
    /// Returns true if the id was already active, which means the upstream
    /// source started it twice. The first start's details are kept.
    pub fn mark_active_if_interesting(&self, id: OperationId, details: Option<&Value>) -> bool {
        let Some(details) = details else {
            return false;
        };
        match self.active.entry(id) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(details.clone());
                false
            }
        }
    }

    /// The operation progress for `id` is attributed to
    pub fn find_owner(&self, id: OperationId) -> Option<OperationId> {
        if self.active.contains_key(&id) {
            Some(id)
        } else {
            self.parents.get(&id).map(|entry| *entry.value())
        }
    }

    /// Forget an operation, returning its resolved parent and, if it was
    /// active, the details it started with
    ///
    /// Both entries are removed unconditionally so transparent operations do not
    /// leak parent links.
    pub fn finish(&self, id: OperationId) -> (Option<OperationId>, Option<Value>) {
        let parent = self.parents.remove(&id).map(|(_, parent)| parent);
        let details = self.active.remove(&id).map(|(_, details)| details);
        (parent, details)
    }

    pub fn is_active(&self, id: OperationId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of operations with a resolved parent link
    pub fn tracked_len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.active.is_empty()
    }
}
