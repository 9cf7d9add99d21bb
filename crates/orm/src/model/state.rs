//! Persistence state attached to every model instance
//!
//! Tracks whether the instance is backed by a stored row and keeps the
//! snapshot of the row as last read or written. Dirty detection is the
//! diff between the current field values and this snapshot, so there is no
//! per-field bookkeeping to keep in sync.

use serde::{Deserialize, Serialize};

use crate::value::Record;

/// Persistence bookkeeping carried inside each model.
///
/// Serde-skipped on model structs; a freshly deserialized model starts
/// transient until `hydrate` or a lifecycle operation marks it persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    #[serde(skip)]
    exists: bool,
    #[serde(skip)]
    snapshot: Option<Record>,
}

impl ModelState {
    /// Whether this instance corresponds to a stored row
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// The row as last synchronized with the driver
    pub fn snapshot(&self) -> Option<&Record> {
        self.snapshot.as_ref()
    }

    /// Mark the instance persisted and reset the dirty baseline
    pub fn mark_persisted(&mut self, snapshot: Record) {
        self.exists = true;
        self.snapshot = Some(snapshot);
    }

    /// Mark the instance as no longer backed by a row
    pub fn mark_removed(&mut self) {
        self.exists = false;
        self.snapshot = None;
    }
}
