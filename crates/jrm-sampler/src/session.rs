//! Monitoring session: the single entry point tying registries together.
//!
//! A [`MonitorSession`] owns the channel cache, one [`SourceRegistry`] per
//! monitored pid and the [`MetricRegistry`]. Everything is built lazily on
//! the first `create_metrics(pid, ..)` and released by `stop(pid)`.
//!
//! # Panic-Free Guarantees
//!
//! All code follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Poisoned locks are recovered, failures surface as `NO_DATA` or `false`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use jrm_core::{Config, MetricKind, Platform, SourceKind};
use tracing::{debug, info, warn};

use crate::channel::{AttachProvider, ChannelCache};
use crate::factory::{MetricList, MetricRegistry};
use crate::registry::SourceRegistry;
use crate::source::{DefaultSourceFactory, SourceFactory};
use crate::sync::lock;

/// Registries and channels of one monitoring run.
pub struct MonitorSession {
    config: Config,
    channels: Arc<ChannelCache>,
    factory: Arc<dyn SourceFactory>,
    sources: Mutex<HashMap<u32, Arc<SourceRegistry>>>,
    metrics: MetricRegistry,
}

impl MonitorSession {
    /// Creates a session reading the real `/proc`.
    ///
    /// Poll intervals are resolved from `config` once, here.
    pub fn new(config: Config, attach: Arc<dyn AttachProvider>) -> Self {
        Self::build(config, attach, None)
    }

    /// Creates a session reading process files below `proc_root`.
    pub fn with_proc_root(config: Config, attach: Arc<dyn AttachProvider>, proc_root: impl Into<PathBuf>) -> Self {
        Self::build(config, attach, Some(proc_root.into()))
    }

    /// Creates a session with a custom source factory.
    ///
    /// `channels` is still used by `disconnect`, `stop` and `request_gc`.
    pub fn with_source_factory(config: Config, channels: Arc<ChannelCache>, factory: Arc<dyn SourceFactory>) -> Self {
        info!(profile = ?config.profile, "Monitor session created");
        Self {
            config,
            channels,
            factory,
            sources: Mutex::new(HashMap::new()),
            metrics: MetricRegistry::new(),
        }
    }

    fn build(config: Config, attach: Arc<dyn AttachProvider>, proc_root: Option<PathBuf>) -> Self {
        let channels = Arc::new(ChannelCache::new(attach));
        let mut factory = DefaultSourceFactory::new(config.poll_intervals(), Arc::clone(&channels));
        if let Some(root) = proc_root {
            factory = factory.with_proc_root(root);
        }
        Self::with_source_factory(config, channels, Arc::new(factory))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channels(&self) -> &Arc<ChannelCache> {
        &self.channels
    }

    /// Source registry of `pid`, created on first request.
    pub fn sources(&self, pid: u32) -> Arc<SourceRegistry> {
        let mut sources = lock(&self.sources);
        let registry = sources.entry(pid).or_insert_with(|| {
            debug!(pid, "Creating source registry");
            Arc::new(SourceRegistry::new(pid, Arc::clone(&self.factory)))
        });
        Arc::clone(registry)
    }

    /// Ordered metrics of `pid` for `platform`.
    ///
    /// The first call builds the list (and with it every source it
    /// needs); later calls return the same list.
    pub fn create_metrics(&self, pid: u32, platform: Platform) -> MetricList {
        if let Some(list) = self.metrics.get(pid) {
            return list;
        }

        let sources = self.sources(pid);
        let list = self
            .metrics
            .create_metrics(pid, platform, &sources, |kind: MetricKind| self.config.is_visible(kind));
        info!(pid, platform = %platform, metrics = list.len(), "Monitoring process");
        list
    }

    /// Releases the JVM channel of `pid`.
    ///
    /// The pid's JVM source and metric list are discarded with it, so the
    /// next `create_metrics` acquires a new channel. Other sources keep
    /// their state. Calling this for an unknown pid does nothing.
    pub fn disconnect(&self, pid: u32) {
        self.channels.disconnect(pid);
        let registry = lock(&self.sources).get(&pid).cloned();
        if let Some(registry) = registry {
            registry.evict(SourceKind::Jvm);
        }
        self.metrics.remove(pid);
    }

    /// Ends monitoring of `pid`: disconnects and drops every source.
    pub fn stop(&self, pid: u32) {
        self.channels.disconnect(pid);
        let had_sources = lock(&self.sources).remove(&pid).is_some();
        let had_metrics = self.metrics.remove(pid);
        if had_sources || had_metrics {
            info!(pid, "Stopped monitoring process");
        }
    }

    /// Stops every monitored pid.
    pub fn shutdown(&self) {
        for pid in self.monitored_pids() {
            self.stop(pid);
        }
        self.channels.disconnect_all();
        info!("Monitor session shut down");
    }

    /// Asks the JVM running as `pid` to collect garbage.
    ///
    /// Returns false if no channel could be acquired or the request failed.
    pub fn request_gc(&self, pid: u32) -> bool {
        let handle = match self.channels.get_or_acquire(pid) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(pid, error = %e, "Cannot request GC without a channel");
                return false;
            }
        };

        match handle.gc() {
            Ok(()) => {
                info!(pid, "Requested garbage collection");
                true
            }
            Err(e) => {
                warn!(pid, error = %e, "Garbage collection request failed");
                false
            }
        }
    }

    /// Pids with sources or metrics, ascending.
    pub fn monitored_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = lock(&self.sources).keys().copied().collect();
        for pid in self.metrics.pids() {
            if !pids.contains(&pid) {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        pids
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.channels.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeJvm;
    use jrm_core::{NO_DATA, SAME_DATA};
    use std::fs;

    fn linux_session(jvm: &FakeJvm, root: &std::path::Path) -> MonitorSession {
        MonitorSession::with_proc_root(Config::default(), jvm.provider(), root)
    }

    fn metric(list: &MetricList, kind: MetricKind) -> &crate::Metric {
        list.iter().find(|m| m.kind() == kind).unwrap()
    }

    #[test]
    fn test_create_metrics_is_idempotent() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        let a = session.create_metrics(5, Platform::Linux);
        let b = session.create_metrics(5, Platform::Linux);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(jvm.attach_count(), 1);
        assert_eq!(session.monitored_pids(), vec![5]);
    }

    #[test]
    fn test_default_visibility_applied() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        let list = session.create_metrics(5, Platform::Linux);
        assert!(metric(&list, MetricKind::Pss).is_enabled());
        assert!(!metric(&list, MetricKind::Uss).is_enabled());
    }

    #[test]
    fn test_missing_process_files_read_no_data() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        let list = session.create_metrics(5, Platform::Linux);
        for _ in 0..3 {
            assert_eq!(metric(&list, MetricKind::Pss).get_value(), NO_DATA);
            assert_eq!(metric(&list, MetricKind::Rss).get_value(), NO_DATA);
        }
    }

    #[test]
    fn test_breakdown_values_through_session() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("5");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("smaps"), "Size: 8 kB\nPss: 6 kB\nPrivate_Clean: 1 kB\n").unwrap();
        let session = linux_session(&jvm, root.path());

        let list = session.create_metrics(5, Platform::Linux);
        assert_eq!(metric(&list, MetricKind::Pss).get_value(), 6 * 1024);
        assert_eq!(metric(&list, MetricKind::Uss).get_value(), 1024);
        assert_eq!(metric(&list, MetricKind::HeapUsed).get_value(), 64 * 1024 * 1024);
        assert_eq!(metric(&list, MetricKind::Uss).get_value(), SAME_DATA);
    }

    #[test]
    fn test_disconnect_reacquires_on_next_create() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        let before = session.create_metrics(5, Platform::Linux);
        session.disconnect(5);
        session.disconnect(5);
        let after = session.create_metrics(5, Platform::Linux);

        assert_eq!(jvm.close_count(), 1);
        assert_eq!(jvm.attach_count(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
        // Non-JVM sources survive a disconnect.
        assert!(Arc::ptr_eq(
            metric(&before, MetricKind::Pss).source(),
            metric(&after, MetricKind::Pss).source()
        ));
    }

    #[test]
    fn test_stop_drops_everything() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        let before = session.create_metrics(5, Platform::Linux);
        session.stop(5);
        assert!(session.monitored_pids().is_empty());

        let after = session.create_metrics(5, Platform::Linux);
        assert!(!Arc::ptr_eq(
            metric(&before, MetricKind::Pss).source(),
            metric(&after, MetricKind::Pss).source()
        ));
    }

    #[test]
    fn test_request_gc() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        assert!(session.request_gc(5));
        assert!(session.request_gc(5));
        assert_eq!(jvm.gc_count(), 2);
        assert_eq!(jvm.attach_count(), 1);
    }

    #[test]
    fn test_request_gc_without_channel() {
        let jvm = FakeJvm::new().failing_attach();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        assert!(!session.request_gc(5));
    }

    #[test]
    fn test_shutdown_closes_channels() {
        let jvm = FakeJvm::new();
        let root = tempfile::tempdir().unwrap();
        let session = linux_session(&jvm, root.path());

        session.create_metrics(1, Platform::Linux);
        session.create_metrics(2, Platform::Linux);
        session.shutdown();

        assert_eq!(jvm.close_count(), 2);
        assert!(session.monitored_pids().is_empty());
    }
}
