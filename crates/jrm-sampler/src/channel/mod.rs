//! Remote instrumentation channel to a JVM's memory management interface.
//!
//! The attach and connect protocol itself lives outside this crate. It is
//! plugged in through [`AttachProvider`]; this module only manages the
//! lifecycle of the resulting handles:
//!
//! ```text
//!  attach(pid) ──▶ AttachedVm ──▶ local connector address
//!                      │            (start agent if missing)
//!                      │                     │
//!                 detach()              connect(address) ──▶ Connector
//!              (short-lived)                                   │
//!                                              memory_accessor()│
//!                                                              ▼
//!                                  ChannelHandle { accessor, connector }
//!                                         (cached per pid until disconnect)
//! ```

use std::fmt;
use std::sync::Arc;

use jrm_core::{ChannelError, ChannelResult, JvmMemory};

mod cache;

pub use cache::ChannelCache;

/// Agent property holding the local connector address.
pub const LOCAL_CONNECTOR_ADDRESS_PROPERTY: &str = "com.sun.management.jmxremote.localConnectorAddress";

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Used and committed bytes of one memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub used: u64,
    pub committed: u64,
}

/// Live proxy to the remote memory management interface.
pub trait MemoryAccessor: Send + Sync {
    /// Current heap usage.
    fn heap_usage(&self) -> ChannelResult<MemoryUsage>;

    /// Current non-heap usage.
    fn non_heap_usage(&self) -> ChannelResult<MemoryUsage>;

    /// Asks the remote runtime to collect garbage.
    fn gc(&self) -> ChannelResult<()>;
}

/// Open connection to a remote management server.
pub trait Connector: Send + Sync {
    /// Obtains a proxy to the memory management interface.
    fn memory_accessor(&self) -> ChannelResult<Arc<dyn MemoryAccessor>>;

    /// Closes the connection. Accessors obtained from it stop working.
    fn close(&self) -> ChannelResult<()>;
}

/// Short-lived attachment to a target runtime.
pub trait AttachedVm: Send {
    /// Reads one agent property.
    fn agent_property(&self, key: &str) -> ChannelResult<Option<String>>;

    /// Starts the local management agent in the target.
    fn start_local_management_agent(&mut self) -> ChannelResult<()>;

    /// Releases the attachment.
    fn detach(self: Box<Self>) -> ChannelResult<()>;
}

/// Attach/connect protocol implementation.
pub trait AttachProvider: Send + Sync {
    /// Attaches to the runtime running as `pid`.
    fn attach(&self, pid: u32) -> ChannelResult<Box<dyn AttachedVm>>;

    /// Opens a connector to a local connector address.
    fn connect(&self, address: &str) -> ChannelResult<Arc<dyn Connector>>;
}

/// Provider for builds without an attach backend.
///
/// Every attach fails, so JVM sources never initialize.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedAttach;

impl AttachProvider for UnsupportedAttach {
    fn attach(&self, _pid: u32) -> ChannelResult<Box<dyn AttachedVm>> {
        Err(ChannelError::Unsupported)
    }

    fn connect(&self, _address: &str) -> ChannelResult<Arc<dyn Connector>> {
        Err(ChannelError::Unsupported)
    }
}

// ============================================================================
// Channel Handle
// ============================================================================

/// A fully acquired channel: accessor proxy plus the connector behind it.
///
/// Handles only exist fully formed; a failed acquisition yields an error
/// and leaves nothing open.
#[derive(Clone)]
pub struct ChannelHandle {
    accessor: Arc<dyn MemoryAccessor>,
    connector: Arc<dyn Connector>,
}

impl ChannelHandle {
    pub(crate) fn new(accessor: Arc<dyn MemoryAccessor>, connector: Arc<dyn Connector>) -> Self {
        Self {
            accessor,
            connector,
        }
    }

    /// Reads heap and non-heap usage in one go.
    pub fn memory(&self) -> ChannelResult<JvmMemory> {
        let heap = self.accessor.heap_usage()?;
        let non_heap = self.accessor.non_heap_usage()?;
        Ok(JvmMemory {
            heap_used: heap.used,
            heap_committed: heap.committed,
            non_heap_used: non_heap.used,
            non_heap_committed: non_heap.committed,
        })
    }

    /// Requests a garbage collection in the remote runtime.
    pub fn gc(&self) -> ChannelResult<()> {
        self.accessor.gc()
    }

    pub(crate) fn close(&self) -> ChannelResult<()> {
        self.connector.close()
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle").finish_non_exhaustive()
    }
}
