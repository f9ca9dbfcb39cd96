//! Scripted JVM channel for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jrm_core::{ChannelError, ChannelResult};

use crate::channel::{
    AttachProvider, AttachedVm, Connector, MemoryAccessor, MemoryUsage, LOCAL_CONNECTOR_ADDRESS_PROPERTY,
};

#[derive(Default)]
struct Shared {
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    agent_starts: AtomicUsize,
    connects: AtomicUsize,
    closes: AtomicUsize,
    gcs: AtomicUsize,
    heap_used: AtomicU64,
    agent_running: AtomicBool,
    agent_start_is_noop: bool,
    fail_attach: bool,
    fail_accessor: bool,
    attach_delay: Duration,
}

/// Builder and counters for a fake attach backend.
pub(crate) struct FakeJvm {
    shared: Arc<Shared>,
}

impl FakeJvm {
    pub(crate) fn new() -> Self {
        let shared = Shared::default();
        shared.agent_running.store(true, Ordering::SeqCst);
        shared.heap_used.store(64 * 1024 * 1024, Ordering::SeqCst);
        Self {
            shared: Arc::new(shared),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut Shared)) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            f(shared);
        }
        self
    }

    pub(crate) fn without_agent(self) -> Self {
        self.shared.agent_running.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn agent_start_is_noop(self) -> Self {
        self.configure(|s| s.agent_start_is_noop = true)
    }

    pub(crate) fn failing_attach(self) -> Self {
        self.configure(|s| s.fail_attach = true)
    }

    pub(crate) fn failing_accessor(self) -> Self {
        self.configure(|s| s.fail_accessor = true)
    }

    pub(crate) fn with_attach_delay(self, delay: Duration) -> Self {
        self.configure(|s| s.attach_delay = delay)
    }

    pub(crate) fn provider(&self) -> Arc<dyn AttachProvider> {
        Arc::new(FakeProvider {
            shared: Arc::clone(&self.shared),
        })
    }

    pub(crate) fn set_heap_used(&self, bytes: u64) {
        self.shared.heap_used.store(bytes, Ordering::SeqCst);
    }

    pub(crate) fn attach_count(&self) -> usize {
        self.shared.attaches.load(Ordering::SeqCst)
    }

    pub(crate) fn detach_count(&self) -> usize {
        self.shared.detaches.load(Ordering::SeqCst)
    }

    pub(crate) fn agent_starts(&self) -> usize {
        self.shared.agent_starts.load(Ordering::SeqCst)
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn gc_count(&self) -> usize {
        self.shared.gcs.load(Ordering::SeqCst)
    }
}

struct FakeProvider {
    shared: Arc<Shared>,
}

impl AttachProvider for FakeProvider {
    fn attach(&self, pid: u32) -> ChannelResult<Box<dyn AttachedVm>> {
        self.shared.attaches.fetch_add(1, Ordering::SeqCst);
        if !self.shared.attach_delay.is_zero() {
            thread::sleep(self.shared.attach_delay);
        }
        if self.shared.fail_attach {
            return Err(ChannelError::Attach {
                pid,
                reason: "no such vm".to_string(),
            });
        }
        Ok(Box::new(FakeVm {
            pid,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn connect(&self, _address: &str) -> ChannelResult<Arc<dyn Connector>> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeConnector {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeVm {
    pid: u32,
    shared: Arc<Shared>,
}

impl AttachedVm for FakeVm {
    fn agent_property(&self, key: &str) -> ChannelResult<Option<String>> {
        if key == LOCAL_CONNECTOR_ADDRESS_PROPERTY && self.shared.agent_running.load(Ordering::SeqCst) {
            return Ok(Some(format!("service:jmx:rmi://127.0.0.1/stub/{}", self.pid)));
        }
        Ok(None)
    }

    fn start_local_management_agent(&mut self) -> ChannelResult<()> {
        self.shared.agent_starts.fetch_add(1, Ordering::SeqCst);
        if !self.shared.agent_start_is_noop {
            self.shared.agent_running.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn detach(self: Box<Self>) -> ChannelResult<()> {
        self.shared.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeConnector {
    shared: Arc<Shared>,
}

impl Connector for FakeConnector {
    fn memory_accessor(&self) -> ChannelResult<Arc<dyn MemoryAccessor>> {
        if self.shared.fail_accessor {
            return Err(ChannelError::Accessor("bean not registered".to_string()));
        }
        Ok(Arc::new(FakeAccessor {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn close(&self) -> ChannelResult<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeAccessor {
    shared: Arc<Shared>,
}

impl MemoryAccessor for FakeAccessor {
    fn heap_usage(&self) -> ChannelResult<MemoryUsage> {
        let used = self.shared.heap_used.load(Ordering::SeqCst);
        Ok(MemoryUsage {
            used,
            committed: used.saturating_mul(2),
        })
    }

    fn non_heap_usage(&self) -> ChannelResult<MemoryUsage> {
        Ok(MemoryUsage {
            used: 16 * 1024 * 1024,
            committed: 32 * 1024 * 1024,
        })
    }

    fn gc(&self) -> ChannelResult<()> {
        self.shared.gcs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
