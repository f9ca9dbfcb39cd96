//! Per-process source registry.
//!
//! Owns exactly one [`Source`] per [`SourceKind`] for a single pid. Two
//! metrics drawn from the same family (pss and uss, say) therefore share
//! one source and one TTL window.
//!
//! # Concurrency
//!
//! The map lock is held only long enough to find or insert the key's
//! slot. Construction happens inside the slot's `OnceLock`, so concurrent
//! first requests for one kind run the factory once while other kinds
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use jrm_core::SourceKind;
use tracing::debug;

use crate::gate::Source;
use crate::source::SourceFactory;
use crate::sync::lock;

type Slot = Arc<OnceLock<Arc<dyn Source>>>;

/// Lazily built sources of one process.
pub struct SourceRegistry {
    pid: u32,
    factory: Arc<dyn SourceFactory>,
    slots: Mutex<HashMap<SourceKind, Slot>>,
}

impl SourceRegistry {
    pub fn new(pid: u32, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            pid,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the source for `kind`, building it on first request.
    ///
    /// Every call for the same kind returns the same instance until it is
    /// evicted.
    pub fn get_or_create(&self, kind: SourceKind) -> Arc<dyn Source> {
        let slot = Arc::clone(lock(&self.slots).entry(kind).or_default());
        let source = slot.get_or_init(|| {
            debug!(pid = self.pid, kind = %kind, "Creating source");
            self.factory.open(self.pid, kind)
        });
        Arc::clone(source)
    }

    /// Returns the source for `kind` if it was already built.
    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn Source>> {
        let slot = lock(&self.slots).get(&kind).cloned()?;
        slot.get().cloned()
    }

    /// Drops the source for `kind`; the next request builds a new one.
    pub fn evict(&self, kind: SourceKind) -> bool {
        lock(&self.slots).remove(&kind).is_some()
    }

    /// Number of kinds with a slot.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
