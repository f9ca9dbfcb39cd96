//! Measured quantities, one variant per source family.

use serde::{Deserialize, Serialize};

/// Proportional and unique set sizes from a memory-map breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetBreakdown {
    /// Proportional set size in bytes.
    pub pss: u64,
    /// Unique set size in bytes.
    pub uss: u64,
}

/// Memory usage reported by a remote JVM's memory management interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JvmMemory {
    pub heap_used: u64,
    pub heap_committed: u64,
    pub non_heap_used: u64,
    pub non_heap_committed: u64,
}

/// A single sample from one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Payload {
    ResidentSet { rss: u64 },
    SetBreakdown(SetBreakdown),
    WorkingSet { ws: u64 },
    PrivateWorkingSet { pws: u64 },
    PrivateBytes { pb: u64 },
    Jvm(JvmMemory),
}

impl From<SetBreakdown> for Payload {
    fn from(value: SetBreakdown) -> Self {
        Self::SetBreakdown(value)
    }
}

impl From<JvmMemory> for Payload {
    fn from(value: JvmMemory) -> Self {
        Self::Jvm(value)
    }
}
