//! jrm sampler - TTL-gated memory sampling for a process and its children
//!
//! This crate turns expensive, failure-prone memory measurements into a
//! cheap, never-failing metric stream that a display can ask "anything
//! new?" many times per second.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  create_metrics(pid)  ┌────────────────┐
//! │ MonitorSession│──────────────────────▶│ MetricRegistry │── Arc<Vec<Metric>>
//! └──────┬────────┘                       └───────┬────────┘
//!        │ one per pid                            │ get_or_create(kind)
//!        ▼                                        ▼
//! ┌────────────────┐   SourceFactory   ┌──────────────────────┐
//! │ SourceRegistry │──────────────────▶│ TtlGate<S: Sampler>  │
//! └────────────────┘                   └──────────┬───────────┘
//!                                                 │ sample()
//!                     ┌──────────────┬────────────┼──────────────┐
//!                     ▼              ▼            ▼              ▼
//!                 procfs         smaps       Windows API   ChannelCache
//!               (VmRSS)      (pss / uss)   (ws/pws/pb)   (JVM heap)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All code follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Provider errors never leave a source; they become `NO_DATA`

pub mod channel;
pub mod factory;
pub mod gate;
pub mod metric;
pub mod poller;
pub mod process;
pub mod registry;
pub mod session;
pub mod source;

mod sync;

#[cfg(test)]
mod testing;

pub use channel::{
    AttachProvider, AttachedVm, ChannelCache, ChannelHandle, Connector, MemoryAccessor, MemoryUsage,
    UnsupportedAttach,
};
pub use factory::{MetricList, MetricRegistry};
pub use gate::{Sampler, Source, Stamped, TtlGate};
pub use metric::Metric;
pub use poller::{spawn_poller, MetricSample, DEFAULT_TICK};
pub use process::descendants;
pub use registry::SourceRegistry;
pub use session::MonitorSession;
pub use source::{DefaultSourceFactory, SourceFactory};
