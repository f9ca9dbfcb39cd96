//! Error types following the panic-free policy.
//!
//! None of these ever reach the display layer: samplers convert them into
//! [`Reading::Unavailable`](crate::Reading::Unavailable) at the source
//! boundary. They exist so that logs can say *why* a reading was lost.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a raw sample provider.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The target process no longer exists.
    #[error("process {pid} is gone")]
    ProcessGone { pid: u32 },

    /// The OS refused access to the process accounting data.
    #[error("permission denied reading process {pid}")]
    PermissionDenied { pid: u32 },

    /// Reading an accounting file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The accounting data did not contain the expected field.
    #[error("missing field {field} for process {pid}")]
    MissingField { pid: u32, field: &'static str },

    /// The provider does not work on this host.
    #[error("{what} is not available on this platform")]
    Unsupported { what: &'static str },

    /// A call through the remote instrumentation channel failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// An OS counter query failed.
    #[error("OS query failed for process {pid}: {message}")]
    Os { pid: u32, message: String },
}

impl SampleError {
    /// Maps an I/O error on a per-process file to the matching variant.
    pub fn from_io(pid: u32, path: impl Into<PathBuf>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::ProcessGone { pid },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { pid },
            _ => Self::Io {
                path: path.into(),
                source: err,
            },
        }
    }
}

/// Errors raised while acquiring or using a remote instrumentation channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Attaching to the target runtime failed.
    #[error("failed to attach to process {pid}: {reason}")]
    Attach { pid: u32, reason: String },

    /// Reading the management agent properties failed.
    #[error("failed to read agent properties: {0}")]
    AgentProperties(String),

    /// The local management agent could not be started.
    #[error("failed to start local management agent: {0}")]
    AgentStart(String),

    /// The agent is running but published no connector address.
    #[error("no local connector address published by process {pid}")]
    NoConnectorAddress { pid: u32 },

    /// Opening the connector failed.
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The memory accessor proxy could not be obtained or invoked.
    #[error("memory accessor failed: {0}")]
    Accessor(String),

    /// Closing the connector failed.
    #[error("failed to close connector: {0}")]
    Close(String),

    /// No attach backend is available.
    #[error("remote attach is not supported by this build")]
    Unsupported,
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for [`Config`](crate::Config).
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type for provider operations.
pub type SampleResult<T> = Result<T, SampleError>;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_not_found_to_process_gone() {
        let err = SampleError::from_io(42, "/proc/42/smaps", io::ErrorKind::NotFound.into());
        assert!(matches!(err, SampleError::ProcessGone { pid: 42 }));
    }

    #[test]
    fn test_from_io_maps_permission_denied() {
        let err = SampleError::from_io(7, "/proc/7/smaps", io::ErrorKind::PermissionDenied.into());
        assert!(matches!(err, SampleError::PermissionDenied { pid: 7 }));
    }

    #[test]
    fn test_from_io_keeps_other_errors() {
        let err = SampleError::from_io(7, "/proc/7/smaps", io::ErrorKind::InvalidData.into());
        assert!(matches!(err, SampleError::Io { .. }));
        assert!(err.to_string().contains("/proc/7/smaps"));
    }

    #[test]
    fn test_channel_error_converts_into_sample_error() {
        let err: SampleError = ChannelError::Unsupported.into();
        assert!(matches!(err, SampleError::Channel(ChannelError::Unsupported)));
    }
}
