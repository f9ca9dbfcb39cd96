//! Per-pid cache of channel handles.
//!
//! # Concurrency
//!
//! Each pid owns a slot guarded by its own mutex. Acquisition runs while
//! holding the slot lock, so concurrent first requests for one pid result
//! in a single attach; requests for other pids are not blocked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jrm_core::{ChannelError, ChannelResult};
use tracing::{debug, info, warn};

use super::{AttachProvider, AttachedVm, ChannelHandle, LOCAL_CONNECTOR_ADDRESS_PROPERTY};
use crate::sync::lock;

type Slot = Arc<Mutex<Option<ChannelHandle>>>;

/// Acquires, caches and releases channel handles keyed by pid.
pub struct ChannelCache {
    provider: Arc<dyn AttachProvider>,
    slots: Mutex<HashMap<u32, Slot>>,
}

impl ChannelCache {
    /// Creates an empty cache backed by `provider`.
    pub fn new(provider: Arc<dyn AttachProvider>) -> Self {
        Self {
            provider,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached handle for `pid`, acquiring it first if needed.
    ///
    /// Failed acquisitions are not cached; the caller decides whether to
    /// ask again.
    ///
    /// # Errors
    ///
    /// Returns the error of the first acquisition step that failed.
    pub fn get_or_acquire(&self, pid: u32) -> ChannelResult<ChannelHandle> {
        let slot = Arc::clone(lock(&self.slots).entry(pid).or_default());
        let mut guard = lock(&slot);

        if let Some(handle) = guard.as_ref() {
            return Ok(handle.clone());
        }

        let handle = match self.acquire(pid) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(pid, error = %e, "Failed to acquire JVM channel");
                return Err(e);
            }
        };

        // A disconnect may have evicted this slot while we were attaching.
        let still_registered = lock(&self.slots)
            .get(&pid)
            .is_some_and(|current| Arc::ptr_eq(current, &slot));
        if !still_registered {
            debug!(pid, "Channel evicted during acquisition, closing it");
            if let Err(e) = handle.close() {
                debug!(pid, error = %e, "Failed to close evicted connector");
            }
            return Err(ChannelError::Attach {
                pid,
                reason: "disconnected during acquisition".to_string(),
            });
        }

        info!(pid, "JVM channel acquired");
        *guard = Some(handle.clone());
        Ok(handle)
    }

    /// Returns the cached handle without acquiring.
    pub fn cached(&self, pid: u32) -> Option<ChannelHandle> {
        let slot = lock(&self.slots).get(&pid).cloned()?;
        let guard = lock(&slot);
        guard.clone()
    }

    /// Closes and evicts the handle of `pid`. Missing entries are fine.
    pub fn disconnect(&self, pid: u32) {
        let Some(slot) = lock(&self.slots).remove(&pid) else {
            return;
        };
        let Some(handle) = lock(&slot).take() else {
            return;
        };

        match handle.close() {
            Ok(()) => info!(pid, "JVM channel closed"),
            Err(e) => warn!(pid, error = %e, "Failed to close JVM channel"),
        }
    }

    /// Closes every cached handle.
    pub fn disconnect_all(&self) {
        let pids: Vec<u32> = lock(&self.slots).keys().copied().collect();
        for pid in pids {
            self.disconnect(pid);
        }
    }

    /// Number of pids with a live handle.
    pub fn connected_count(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    fn acquire(&self, pid: u32) -> ChannelResult<ChannelHandle> {
        let mut vm = self.provider.attach(pid)?;
        let result = self.connect_through(vm.as_mut(), pid);

        // The attachment is only needed to find the connector.
        if let Err(e) = vm.detach() {
            debug!(pid, error = %e, "Failed to detach");
        }

        result
    }

    fn connect_through(&self, vm: &mut dyn AttachedVm, pid: u32) -> ChannelResult<ChannelHandle> {
        let address = match vm.agent_property(LOCAL_CONNECTOR_ADDRESS_PROPERTY)? {
            Some(address) => address,
            None => {
                debug!(pid, "No local connector address, starting management agent");
                vm.start_local_management_agent()?;
                vm.agent_property(LOCAL_CONNECTOR_ADDRESS_PROPERTY)?
                    .ok_or(ChannelError::NoConnectorAddress { pid })?
            }
        };

        let connector = self.provider.connect(&address)?;
        match connector.memory_accessor() {
            Ok(accessor) => Ok(ChannelHandle::new(accessor, connector)),
            Err(e) => {
                if let Err(close_err) = connector.close() {
                    debug!(pid, error = %close_err, "Failed to close connector after accessor failure");
                }
                Err(e)
            }
        }
    }
}
