//! Raw providers and the factory that gates them.
//!
//! Each submodule implements [`Sampler`](crate::gate::Sampler) for one
//! source family. [`DefaultSourceFactory`] opens the matching provider and
//! wraps it in a [`TtlGate`] with the configured interval.

use std::path::PathBuf;
use std::sync::Arc;

use jrm_core::{PollIntervals, SourceKind};

use crate::channel::ChannelCache;
use crate::gate::{Source, TtlGate};

pub mod jvm;
pub mod resident;
pub mod smaps;
pub mod windows;

pub use jvm::JvmSampler;
pub use resident::ResidentSetSampler;
pub use smaps::{parse_breakdown, SmapsSampler};
pub use windows::{WindowsCounter, WindowsCounterSampler};

/// Default location of the per-process tree.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Builds gated sources.
///
/// Called by [`SourceRegistry`](crate::SourceRegistry) at most once per
/// (pid, kind). Construction must not fail: a provider that cannot open
/// yields a dead source.
pub trait SourceFactory: Send + Sync {
    fn open(&self, pid: u32, kind: SourceKind) -> Arc<dyn Source>;
}

/// Factory backed by the real providers.
pub struct DefaultSourceFactory {
    intervals: PollIntervals,
    proc_root: PathBuf,
    channels: Arc<ChannelCache>,
}

impl DefaultSourceFactory {
    pub fn new(intervals: PollIntervals, channels: Arc<ChannelCache>) -> Self {
        Self {
            intervals,
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            channels,
        }
    }

    /// Reads process files below `proc_root` instead of `/proc`.
    #[must_use]
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    pub fn intervals(&self) -> &PollIntervals {
        &self.intervals
    }
}

impl SourceFactory for DefaultSourceFactory {
    fn open(&self, pid: u32, kind: SourceKind) -> Arc<dyn Source> {
        let interval = self.intervals.get(kind);
        let root = self.proc_root.as_path();

        match kind {
            SourceKind::ResidentSet => Arc::new(TtlGate::open(pid, kind, interval, || {
                ResidentSetSampler::open(root, pid)
            })),
            SourceKind::SetBreakdown => Arc::new(TtlGate::open(pid, kind, interval, || {
                SmapsSampler::open(root, pid)
            })),
            SourceKind::WorkingSet => Arc::new(TtlGate::open(pid, kind, interval, || {
                WindowsCounterSampler::open(pid, WindowsCounter::WorkingSet)
            })),
            SourceKind::PrivateWorkingSet => Arc::new(TtlGate::open(pid, kind, interval, || {
                WindowsCounterSampler::open(pid, WindowsCounter::PrivateWorkingSet)
            })),
            SourceKind::PrivateBytes => Arc::new(TtlGate::open(pid, kind, interval, || {
                WindowsCounterSampler::open(pid, WindowsCounter::PrivateBytes)
            })),
            SourceKind::Jvm => Arc::new(TtlGate::open(pid, kind, interval, || {
                JvmSampler::open(&self.channels, pid)
            })),
        }
    }
}
