//! Metric registry: builds and caches the ordered metric list per pid.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use jrm_core::{MetricKind, Platform};
use tracing::debug;

use crate::metric::Metric;
use crate::registry::SourceRegistry;
use crate::sync::lock;

/// Ordered metrics of one process, shared with the display layer.
pub type MetricList = Arc<Vec<Metric>>;

type Slot = Arc<OnceLock<MetricList>>;

/// Caches one metric list per pid.
#[derive(Default)]
pub struct MetricRegistry {
    lists: Mutex<HashMap<u32, Slot>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metric list for `pid`, building it on first request.
    ///
    /// Only metrics applicable to `platform` are included, in
    /// [`MetricKind::ALL`] order. Sources come from `sources`, so metrics
    /// of the same family share one source. `visible` decides each
    /// metric's initial enabled flag.
    ///
    /// Later calls for the same pid return the cached list unchanged,
    /// whatever their arguments.
    pub fn create_metrics(
        &self,
        pid: u32,
        platform: Platform,
        sources: &SourceRegistry,
        visible: impl Fn(MetricKind) -> bool,
    ) -> MetricList {
        let slot = Arc::clone(lock(&self.lists).entry(pid).or_default());
        let list = slot.get_or_init(|| {
            let metrics: Vec<Metric> = MetricKind::ALL
                .iter()
                .copied()
                .filter(|kind| kind.is_applicable(platform))
                .map(|kind| {
                    let source = sources.get_or_create(kind.source_kind());
                    Metric::new(kind, pid, source, visible(kind))
                })
                .collect();
            debug!(pid, platform = %platform, count = metrics.len(), "Built metric list");
            Arc::new(metrics)
        });
        Arc::clone(list)
    }

    /// Returns the cached list without building one.
    pub fn get(&self, pid: u32) -> Option<MetricList> {
        let slot = lock(&self.lists).get(&pid).cloned()?;
        slot.get().cloned()
    }

    /// Forgets the list of `pid`.
    pub fn remove(&self, pid: u32) -> bool {
        lock(&self.lists).remove(&pid).is_some()
    }

    /// Pids with a cached list, ascending.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = lock(&self.lists).keys().copied().collect();
        pids.sort_unstable();
        pids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Source, Stamped};
    use crate::source::SourceFactory;
    use jrm_core::{Payload, Reading, SourceKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct Stub(u32, SourceKind);

    impl Source for Stub {
        fn pid(&self) -> u32 {
            self.0
        }
        fn kind(&self) -> SourceKind {
            self.1
        }
        fn poll_interval(&self) -> Duration {
            Duration::ZERO
        }
        fn is_initialized(&self) -> bool {
            false
        }
        fn get_stamped(&self) -> Stamped<Payload> {
            Stamped {
                reading: Reading::Unavailable,
                sequence: 0,
            }
        }
        fn next_poll_instant(&self) -> Instant {
            Instant::now()
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl SourceFactory for Counting {
        fn open(&self, pid: u32, kind: SourceKind) -> Arc<dyn Source> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Arc::new(Stub(pid, kind))
        }
    }

    fn names(list: &[Metric]) -> Vec<&'static str> {
        list.iter().map(Metric::name).collect()
    }

    #[test]
    fn test_linux_list() {
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, Arc::new(Counting::default()));

        let list = registry.create_metrics(1, Platform::Linux, &sources, |_| true);
        assert_eq!(
            names(&list),
            vec![
                "rss",
                "pss",
                "uss",
                "heap_used",
                "heap_committed",
                "non_heap_used",
                "non_heap_committed"
            ]
        );
    }

    #[test]
    fn test_windows_list() {
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, Arc::new(Counting::default()));

        let list = registry.create_metrics(1, Platform::Windows, &sources, |_| true);
        assert_eq!(
            names(&list),
            vec![
                "ws",
                "pws",
                "pb",
                "heap_used",
                "heap_committed",
                "non_heap_used",
                "non_heap_committed"
            ]
        );
    }

    #[test]
    fn test_idempotent_per_pid() {
        let factory = Arc::new(Counting::default());
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, factory.clone());

        let a = registry.create_metrics(1, Platform::Linux, &sources, |_| true);
        let opened = factory.0.load(Ordering::SeqCst);
        let b = registry.create_metrics(1, Platform::Windows, &sources, |_| false);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.0.load(Ordering::SeqCst), opened);
    }

    #[test]
    fn test_family_members_share_source() {
        let factory = Arc::new(Counting::default());
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, factory.clone());

        let list = registry.create_metrics(1, Platform::Linux, &sources, |_| true);
        let pss = list.iter().find(|m| m.kind() == MetricKind::Pss).unwrap();
        let uss = list.iter().find(|m| m.kind() == MetricKind::Uss).unwrap();

        assert!(Arc::ptr_eq(pss.source(), uss.source()));
        // resident, breakdown, jvm
        assert_eq!(factory.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_visibility_sets_enabled_flag() {
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, Arc::new(Counting::default()));

        let list = registry.create_metrics(1, Platform::Linux, &sources, |kind| kind.visible_by_default());
        for metric in list.iter() {
            assert_eq!(metric.is_enabled(), metric.kind().visible_by_default());
        }
    }

    #[test]
    fn test_remove_rebuilds() {
        let registry = MetricRegistry::new();
        let sources = SourceRegistry::new(1, Arc::new(Counting::default()));

        let a = registry.create_metrics(1, Platform::Linux, &sources, |_| true);
        assert_eq!(registry.pids(), vec![1]);
        assert!(registry.remove(1));
        assert!(registry.get(1).is_none());
        let b = registry.create_metrics(1, Platform::Linux, &sources, |_| true);

        assert!(!Arc::ptr_eq(&a, &b));
    }
}
