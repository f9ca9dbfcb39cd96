//! Metric definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payload::Payload;
use crate::platform::Platform;
use crate::source::SourceKind;

/// A named, colored quantity plotted by the display layer.
///
/// Declaration order is the legend order: [`MetricKind::ALL`] is iterated
/// when building metric lists so that colors stay stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Rss,
    Pss,
    Uss,
    Ws,
    Pws,
    Pb,
    HeapUsed,
    HeapCommitted,
    NonHeapUsed,
    NonHeapCommitted,
}

impl MetricKind {
    /// All metric kinds in declaration order.
    pub const ALL: [MetricKind; 10] = [
        MetricKind::Rss,
        MetricKind::Pss,
        MetricKind::Uss,
        MetricKind::Ws,
        MetricKind::Pws,
        MetricKind::Pb,
        MetricKind::HeapUsed,
        MetricKind::HeapCommitted,
        MetricKind::NonHeapUsed,
        MetricKind::NonHeapCommitted,
    ];

    /// Short name used as the metric identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Pss => "pss",
            Self::Uss => "uss",
            Self::Ws => "ws",
            Self::Pws => "pws",
            Self::Pb => "pb",
            Self::HeapUsed => "heap_used",
            Self::HeapCommitted => "heap_committed",
            Self::NonHeapUsed => "non_heap_used",
            Self::NonHeapCommitted => "non_heap_committed",
        }
    }

    /// Human-readable label for legends.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rss => "Resident Set Size",
            Self::Pss => "Proportional Set Size",
            Self::Uss => "Unique Set Size",
            Self::Ws => "Working Set",
            Self::Pws => "Private Working Set",
            Self::Pb => "Private Bytes",
            Self::HeapUsed => "Heap Used",
            Self::HeapCommitted => "Heap Committed",
            Self::NonHeapUsed => "Non-Heap Used",
            Self::NonHeapCommitted => "Non-Heap Committed",
        }
    }

    /// Plot color name.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Rss => "red",
            Self::Pss => "green",
            Self::Uss => "blue",
            Self::Ws => "yellow",
            Self::Pws => "purple",
            Self::Pb => "orange",
            Self::HeapUsed => "violet",
            Self::HeapCommitted => "cyan",
            Self::NonHeapUsed => "gray",
            Self::NonHeapCommitted => "brown",
        }
    }

    /// Platforms this metric can be measured on.
    pub fn platforms(&self) -> &'static [Platform] {
        match self {
            Self::Rss | Self::Pss | Self::Uss => &[Platform::Linux],
            Self::Ws | Self::Pws | Self::Pb => &[Platform::Windows],
            Self::HeapUsed | Self::HeapCommitted | Self::NonHeapUsed | Self::NonHeapCommitted => {
                &Platform::ALL
            }
        }
    }

    /// Returns true if this metric applies to `platform`.
    pub fn is_applicable(&self, platform: Platform) -> bool {
        self.platforms().contains(&platform)
    }

    /// The source this metric draws from.
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Rss => SourceKind::ResidentSet,
            Self::Pss | Self::Uss => SourceKind::SetBreakdown,
            Self::Ws => SourceKind::WorkingSet,
            Self::Pws => SourceKind::PrivateWorkingSet,
            Self::Pb => SourceKind::PrivateBytes,
            Self::HeapUsed | Self::HeapCommitted | Self::NonHeapUsed | Self::NonHeapCommitted => {
                SourceKind::Jvm
            }
        }
    }

    /// Whether the metric is shown when no configuration overrides it.
    pub fn visible_by_default(&self) -> bool {
        !matches!(self, Self::Uss | Self::Pb)
    }

    /// Extracts this metric's byte count from a payload.
    ///
    /// Returns `None` if the payload belongs to another family.
    pub fn extract(&self, payload: &Payload) -> Option<u64> {
        match (self, payload) {
            (Self::Rss, Payload::ResidentSet { rss }) => Some(*rss),
            (Self::Pss, Payload::SetBreakdown(b)) => Some(b.pss),
            (Self::Uss, Payload::SetBreakdown(b)) => Some(b.uss),
            (Self::Ws, Payload::WorkingSet { ws }) => Some(*ws),
            (Self::Pws, Payload::PrivateWorkingSet { pws }) => Some(*pws),
            (Self::Pb, Payload::PrivateBytes { pb }) => Some(*pb),
            (Self::HeapUsed, Payload::Jvm(m)) => Some(m.heap_used),
            (Self::HeapCommitted, Payload::Jvm(m)) => Some(m.heap_committed),
            (Self::NonHeapUsed, Payload::Jvm(m)) => Some(m.non_heap_used),
            (Self::NonHeapCommitted, Payload::Jvm(m)) => Some(m.non_heap_committed),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{JvmMemory, SetBreakdown};

    #[test]
    fn test_breakdown_metrics_share_a_source() {
        assert_eq!(MetricKind::Pss.source_kind(), MetricKind::Uss.source_kind());
        assert_eq!(MetricKind::Pss.source_kind(), SourceKind::SetBreakdown);
    }

    #[test]
    fn test_jvm_metrics_apply_everywhere() {
        for kind in [
            MetricKind::HeapUsed,
            MetricKind::HeapCommitted,
            MetricKind::NonHeapUsed,
            MetricKind::NonHeapCommitted,
        ] {
            assert!(kind.is_applicable(Platform::Linux));
            assert!(kind.is_applicable(Platform::Windows));
        }
    }

    #[test]
    fn test_platform_specific_metrics() {
        assert!(MetricKind::Rss.is_applicable(Platform::Linux));
        assert!(!MetricKind::Rss.is_applicable(Platform::Windows));
        assert!(MetricKind::Pb.is_applicable(Platform::Windows));
        assert!(!MetricKind::Pb.is_applicable(Platform::Linux));
    }

    #[test]
    fn test_extract() {
        let breakdown = Payload::SetBreakdown(SetBreakdown { pss: 10, uss: 4 });
        assert_eq!(MetricKind::Pss.extract(&breakdown), Some(10));
        assert_eq!(MetricKind::Uss.extract(&breakdown), Some(4));
        assert_eq!(MetricKind::Rss.extract(&breakdown), None);

        let jvm = Payload::Jvm(JvmMemory {
            heap_used: 1,
            heap_committed: 2,
            non_heap_used: 3,
            non_heap_committed: 4,
        });
        assert_eq!(MetricKind::HeapCommitted.extract(&jvm), Some(2));
        assert_eq!(MetricKind::NonHeapCommitted.extract(&jvm), Some(4));
    }

    #[test]
    fn test_default_visibility() {
        assert!(MetricKind::Rss.visible_by_default());
        assert!(!MetricKind::Uss.visible_by_default());
        assert!(!MetricKind::Pb.visible_by_default());
    }
}
