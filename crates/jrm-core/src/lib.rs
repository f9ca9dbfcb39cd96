//! jrm core - shared types for process memory sampling
//!
//! This crate provides the domain vocabulary shared between the
//! sampling engine (jrm-sampler) and the `jrm` binary.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod metric;
pub mod payload;
pub mod platform;
pub mod reading;
pub mod source;

// Re-exports for convenience
pub use config::{Config, PollIntervals, PollProfile};
pub use error::{ChannelError, ChannelResult, ConfigError, SampleError, SampleResult};
pub use metric::MetricKind;
pub use payload::{JvmMemory, Payload, SetBreakdown};
pub use platform::Platform;
pub use reading::{Freshness, Reading, NO_DATA, SAME_DATA};
pub use source::SourceKind;
