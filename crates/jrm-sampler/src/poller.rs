//! Background poller driving metrics at a fixed UI tick.
//!
//! Metrics are grouped by the source they read. On each tick a group picks
//! its enabled metrics whose source is due (`next_poll_instant() <= now`)
//! and evaluates them together on the blocking pool, so siblings see the
//! same sample. Groups run independently: a slow breakdown parse or remote
//! call delays neither the tick loop nor the other sources. A group whose
//! previous evaluation is still running is skipped. Every evaluated value
//! is sent out, sentinels included.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jrm_core::MetricKind;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::factory::MetricList;

/// Default UI tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// One evaluated metric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
    pub pid: u32,
    pub metric: MetricKind,
    /// Bytes, or one of the sentinels.
    pub value: i64,
    pub at: DateTime<Utc>,
}

/// Metrics of one list that share a source.
struct SourceGroup {
    members: Vec<usize>,
    busy: Arc<AtomicBool>,
}

/// Clears a group's busy flag when its evaluation ends, panics included.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawns the polling task for one metric list.
///
/// The task ends when `cancel_token` fires or the receiver is dropped.
pub fn spawn_poller(
    metrics: MetricList,
    tick: Duration,
    tx: mpsc::Sender<MetricSample>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let groups = group_by_source(&metrics);
        let mut pending: JoinSet<Vec<MetricSample>> = JoinSet::new();

        info!(
            metrics = metrics.len(),
            sources = groups.len(),
            tick_ms = tick.as_millis() as u64,
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Poller shutting down");
                    break;
                }

                Some(done) = pending.join_next(), if !pending.is_empty() => {
                    let samples = match done {
                        Ok(samples) => samples,
                        Err(e) => {
                            warn!(error = %e, "Metric evaluation task failed");
                            continue;
                        }
                    };
                    if !send_all(&tx, samples, &cancel_token).await {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if tx.is_closed() {
                        debug!("Sample receiver dropped, stopping poller");
                        break;
                    }
                    dispatch_due(&metrics, &groups, &mut pending);
                }
            }
        }

        // Evaluations still running finish on their own; their results are dropped.
        pending.detach_all();
        debug!("Poller task completed");
    })
}

fn group_by_source(metrics: &MetricList) -> Vec<SourceGroup> {
    let mut index: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<SourceGroup> = Vec::new();

    for (i, metric) in metrics.iter().enumerate() {
        let key = Arc::as_ptr(metric.source()) as *const () as usize;
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(SourceGroup {
                members: Vec::new(),
                busy: Arc::new(AtomicBool::new(false)),
            });
            groups.len() - 1
        });
        groups[slot].members.push(i);
    }
    groups
}

/// Starts one blocking evaluation per idle source group with due metrics.
///
/// The due set is fixed before any metric is read; reading the first
/// sibling moves the source's next poll instant.
fn dispatch_due(metrics: &MetricList, groups: &[SourceGroup], pending: &mut JoinSet<Vec<MetricSample>>) {
    let now = Instant::now();

    for group in groups {
        if group.busy.load(Ordering::Acquire) {
            continue;
        }
        let due: Vec<usize> = group
            .members
            .iter()
            .copied()
            .filter(|&i| metrics[i].is_enabled() && metrics[i].next_poll_instant() <= now)
            .collect();
        if due.is_empty() {
            continue;
        }

        group.busy.store(true, Ordering::Release);
        let guard = BusyGuard(Arc::clone(&group.busy));
        let metrics = Arc::clone(metrics);

        pending.spawn_blocking(move || {
            let _guard = guard;
            let at = Utc::now();
            due.into_iter()
                .map(|i| {
                    let m = &metrics[i];
                    MetricSample {
                        pid: m.pid(),
                        metric: m.kind(),
                        value: m.get_value(),
                        at,
                    }
                })
                .collect()
        });
    }
}

/// Returns false when the poller should stop.
async fn send_all(
    tx: &mpsc::Sender<MetricSample>,
    samples: Vec<MetricSample>,
    cancel_token: &CancellationToken,
) -> bool {
    for sample in samples {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => return false,

            sent = tx.send(sample) => {
                if sent.is_err() {
                    debug!("Sample receiver dropped, stopping poller");
                    return false;
                }
            }
        }
    }
    true
}
