//! Metric facade consumed by the display layer.
//!
//! A [`Metric`] projects one field out of its source's payload and encodes
//! the result as a single integer:
//!
//! | value      | meaning                                  |
//! |------------|------------------------------------------|
//! | `>= 0`     | fresh sample in bytes                    |
//! | [`SAME_DATA`] (-2) | nothing new since the last call  |
//! | [`NO_DATA`] (-1)   | source unavailable or field absent |
//!
//! Each metric tracks which source sample it last reported, so siblings
//! sharing one source each get the fresh value once per sample.
//!
//! [`SAME_DATA`]: jrm_core::SAME_DATA
//! [`NO_DATA`]: jrm_core::NO_DATA

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use jrm_core::{MetricKind, Platform, Reading};

use crate::gate::Source;

/// One plotted quantity of one process.
pub struct Metric {
    kind: MetricKind,
    pid: u32,
    source: Arc<dyn Source>,
    enabled: AtomicBool,
    /// Sequence of the last source sample this metric reported.
    last_seen: AtomicU64,
}

impl Metric {
    pub fn new(kind: MetricKind, pid: u32, source: Arc<dyn Source>, enabled: bool) -> Self {
        Self {
            kind,
            pid,
            source,
            enabled: AtomicBool::new(enabled),
            last_seen: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn display_name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn color(&self) -> &'static str {
        self.kind.color()
    }

    pub fn platforms(&self) -> &'static [Platform] {
        self.kind.platforms()
    }

    /// Source backing this metric, shared with its siblings.
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Typed reading of this metric's field.
    ///
    /// `Fresh` the first time this metric sees a given source sample,
    /// `Unchanged` after that. A payload without the field reads as
    /// `Unavailable`.
    pub fn reading(&self) -> Reading<u64> {
        let stamped = self.source.get_stamped();
        let reading = match stamped.reading {
            Reading::Unavailable => Reading::Unavailable,
            Reading::Fresh(payload) | Reading::Unchanged(payload) => {
                if self.last_seen.swap(stamped.sequence, Ordering::AcqRel) != stamped.sequence {
                    Reading::Fresh(payload)
                } else {
                    Reading::Unchanged(payload)
                }
            }
        };
        let kind = self.kind;
        reading.and_then(|payload| kind.extract(&payload))
    }

    /// Sentinel-coded value, see the module docs.
    pub fn get_value(&self) -> i64 {
        self.reading().to_sentinel()
    }

    /// When the source will next produce fresh data.
    pub fn next_poll_instant(&self) -> Instant {
        self.source.next_poll_instant()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("kind", &self.kind)
            .field("pid", &self.pid)
            .field("source", &self.source.kind())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
