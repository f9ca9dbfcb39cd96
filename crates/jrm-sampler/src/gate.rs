//! TTL-gated sources.
//!
//! A [`TtlGate`] wraps one raw [`Sampler`] with a fixed poll interval and
//! turns its fallible, possibly expensive measurements into a never-failing
//! stream of [`Reading`]s:
//!
//! ```text
//!   get_data()
//!       │
//!       ├── elapsed < interval ───── cached value ─▶ Unchanged(v)
//!       │                         └─ no value ────▶ Unavailable
//!       │
//!       ├── never opened ──────────────────────────▶ Unavailable (forever)
//!       │
//!       └── elapsed ≥ interval ─▶ sample()
//!                                   ├─ Ok(v)  ───▶ Fresh(v), cache v
//!                                   └─ Err(e) ───▶ Unavailable, drop cache
//!                          (every outcome restarts the interval)
//! ```
//!
//! Each successful sample gets a sequence number. Several metrics reading
//! one source use it to tell whether they have already seen the cached
//! value.
//!
//! The check-then-sample sequence runs under the gate's state lock so two
//! callers can never both decide that the interval expired. The poll
//! instant is mirrored behind a second lock that is never held while
//! sampling, so `next_poll_instant()` does not wait on a slow sample.
//!
//! # Panic-Free Guarantees
//!
//! Sampler errors are logged and converted; nothing escapes `get_data()`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use jrm_core::{Payload, Reading, SampleResult, SourceKind};
use tracing::{debug, warn};

use crate::sync::lock;

// ============================================================================
// Traits
// ============================================================================

/// A raw measurement for one process.
///
/// Implementations may block on I/O and may fail; the gate in front of
/// them takes care of rate limiting and error conversion.
pub trait Sampler: Send + 'static {
    /// Measured quantity.
    type Output: Clone + Into<Payload> + Send;

    /// Takes one measurement.
    fn sample(&mut self) -> SampleResult<Self::Output>;
}

/// A reading plus the sequence number of the sample it carries.
///
/// Sequence numbers start at 1 and grow with every successful sample of
/// one source. `0` means nothing was ever sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<T> {
    pub reading: Reading<T>,
    pub sequence: u64,
}

impl<T> Stamped<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stamped<U> {
        Stamped {
            reading: self.reading.map(f),
            sequence: self.sequence,
        }
    }
}

/// Type-erased view of a gated source, as stored in registries.
pub trait Source: Send + Sync {
    /// Process this source measures.
    fn pid(&self) -> u32;

    /// Family of this source.
    fn kind(&self) -> SourceKind;

    /// Poll interval, fixed at construction.
    fn poll_interval(&self) -> Duration;

    /// Returns false if the source could not be opened and is dead.
    fn is_initialized(&self) -> bool;

    /// Like [`get_data`](Source::get_data), tagged with the sample sequence.
    fn get_stamped(&self) -> Stamped<Payload>;

    /// Returns cached data, a fresh sample, or `Unavailable`. Never fails.
    fn get_data(&self) -> Reading<Payload> {
        self.get_stamped().reading
    }

    /// Earliest instant at which `get_data()` will sample again.
    ///
    /// Never waits for a sample in progress.
    fn next_poll_instant(&self) -> Instant;
}

// ============================================================================
// TTL Gate
// ============================================================================

struct GateState<S: Sampler> {
    /// `None` when opening failed; the gate is then dead for good.
    sampler: Option<S>,
    last_poll: Option<Instant>,
    last_value: Option<S::Output>,
    sequence: u64,
}

/// Rate-limiting wrapper around a [`Sampler`].
pub struct TtlGate<S: Sampler> {
    pid: u32,
    kind: SourceKind,
    interval: Duration,
    initialized: bool,
    /// Copy of `GateState::last_poll` for readers that must not block.
    polled_at: Mutex<Option<Instant>>,
    state: Mutex<GateState<S>>,
}

impl<S: Sampler> TtlGate<S> {
    /// Creates a live gate around an opened sampler.
    pub fn new(pid: u32, kind: SourceKind, interval: Duration, sampler: S) -> Self {
        Self::from_parts(pid, kind, interval, Some(sampler))
    }

    /// Creates a gate that reports `Unavailable` for its whole lifetime.
    pub fn dead(pid: u32, kind: SourceKind, interval: Duration) -> Self {
        Self::from_parts(pid, kind, interval, None)
    }

    /// Opens the sampler and wraps it.
    ///
    /// If `open` fails the returned gate is dead: it never retries, and
    /// monitoring this process again requires building a new gate.
    pub fn open(
        pid: u32,
        kind: SourceKind,
        interval: Duration,
        open: impl FnOnce() -> SampleResult<S>,
    ) -> Self {
        match open() {
            Ok(sampler) => {
                debug!(pid, kind = %kind, interval_ms = interval.as_millis() as u64, "Source opened");
                Self::new(pid, kind, interval, sampler)
            }
            Err(e) => {
                warn!(pid, kind = %kind, error = %e, "Source failed to open, it stays unavailable");
                Self::dead(pid, kind, interval)
            }
        }
    }

    fn from_parts(pid: u32, kind: SourceKind, interval: Duration, sampler: Option<S>) -> Self {
        Self {
            pid,
            kind,
            interval,
            initialized: sampler.is_some(),
            polled_at: Mutex::new(None),
            state: Mutex::new(GateState {
                sampler,
                last_poll: None,
                last_value: None,
                sequence: 0,
            }),
        }
    }

    /// Typed variant of [`Source::get_data`].
    pub fn get(&self) -> Reading<S::Output> {
        self.get_stamped_typed().reading
    }

    /// Typed variant of [`Source::get_stamped`].
    pub fn get_stamped_typed(&self) -> Stamped<S::Output> {
        let mut state = lock(&self.state);
        let now = Instant::now();

        if let Some(last_poll) = state.last_poll {
            if now.saturating_duration_since(last_poll) < self.interval {
                let reading = match &state.last_value {
                    Some(value) => Reading::Unchanged(value.clone()),
                    None => Reading::Unavailable,
                };
                return Stamped {
                    reading,
                    sequence: state.sequence,
                };
            }
        }

        // Dead gates still consume windows so callers see them on the
        // regular cadence.
        state.last_poll = Some(now);
        *lock(&self.polled_at) = Some(now);

        let result = match state.sampler.as_mut() {
            Some(sampler) => sampler.sample(),
            None => {
                return Stamped {
                    reading: Reading::Unavailable,
                    sequence: state.sequence,
                }
            }
        };

        match result {
            Ok(value) => {
                state.sequence += 1;
                state.last_value = Some(value.clone());
                Stamped {
                    reading: Reading::Fresh(value),
                    sequence: state.sequence,
                }
            }
            Err(e) => {
                debug!(pid = self.pid, kind = %self.kind, error = %e, "Sample failed");
                state.last_value = None;
                Stamped {
                    reading: Reading::Unavailable,
                    sequence: state.sequence,
                }
            }
        }
    }
}

impl<S: Sampler> Source for TtlGate<S> {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn get_stamped(&self) -> Stamped<Payload> {
        self.get_stamped_typed().map(Into::into)
    }

    fn next_poll_instant(&self) -> Instant {
        match *lock(&self.polled_at) {
            Some(last_poll) => last_poll + self.interval,
            None => Instant::now(),
        }
    }
}
