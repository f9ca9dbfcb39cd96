//! Source families and their poll cadence.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifies one family of raw measurements.
///
/// Several metrics may share a source kind (pss and uss both come from
/// the breakdown), in which case they share one source and one TTL window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Resident set size counter.
    ResidentSet,
    /// Per-mapping proportional/private breakdown.
    SetBreakdown,
    /// Windows working set.
    WorkingSet,
    /// Windows private working set.
    PrivateWorkingSet,
    /// Windows private bytes (commit charge).
    PrivateBytes,
    /// Remote JVM heap and non-heap usage.
    Jvm,
}

impl SourceKind {
    /// All source kinds in declaration order.
    pub const ALL: [SourceKind; 6] = [
        SourceKind::ResidentSet,
        SourceKind::SetBreakdown,
        SourceKind::WorkingSet,
        SourceKind::PrivateWorkingSet,
        SourceKind::PrivateBytes,
        SourceKind::Jvm,
    ];

    /// Default poll interval.
    ///
    /// Cheap counters are sampled often, expensive breakdowns rarely.
    pub const fn default_interval(&self) -> Duration {
        match self {
            Self::ResidentSet => Duration::from_secs(1),
            Self::SetBreakdown => Duration::from_secs(30),
            Self::WorkingSet => Duration::from_secs(2),
            Self::PrivateWorkingSet => Duration::from_secs(5),
            Self::PrivateBytes => Duration::from_secs(10),
            Self::Jvm => Duration::from_secs(5),
        }
    }

    /// Returns the snake_case name used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResidentSet => "resident_set",
            Self::SetBreakdown => "set_breakdown",
            Self::WorkingSet => "working_set",
            Self::PrivateWorkingSet => "private_working_set",
            Self::PrivateBytes => "private_bytes",
            Self::Jvm => "jvm",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
