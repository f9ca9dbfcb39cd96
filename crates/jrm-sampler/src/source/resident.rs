//! Resident set size from the process status file.
//!
//! Uses the `procfs` crate on Linux. The process directory is opened once;
//! later samples read `VmRSS` through that handle, so a recycled PID is
//! never mistaken for the original process.

use std::path::Path;

use jrm_core::{Payload, SampleError, SampleResult};

use crate::gate::Sampler;

/// Samples `VmRSS` of one process.
pub struct ResidentSetSampler {
    #[cfg(target_os = "linux")]
    process: procfs::process::Process,
    pid: u32,
}

#[cfg(target_os = "linux")]
impl ResidentSetSampler {
    /// Opens `<proc_root>/<pid>`.
    ///
    /// # Errors
    ///
    /// Fails if the process directory does not exist or is not accessible.
    pub fn open(proc_root: &Path, pid: u32) -> SampleResult<Self> {
        let process = procfs::process::Process::new_with_root(proc_root.join(pid.to_string()))
            .map_err(|e| map_proc_error(pid, e))?;
        Ok(Self { process, pid })
    }
}

#[cfg(not(target_os = "linux"))]
impl ResidentSetSampler {
    /// Resident set sampling needs procfs.
    pub fn open(_proc_root: &Path, _pid: u32) -> SampleResult<Self> {
        Err(SampleError::Unsupported {
            what: "resident set sampling",
        })
    }
}

impl Sampler for ResidentSetSampler {
    type Output = Payload;

    #[cfg(target_os = "linux")]
    fn sample(&mut self) -> SampleResult<Payload> {
        let status = self.process.status().map_err(|e| map_proc_error(self.pid, e))?;
        let kb = status.vmrss.ok_or(SampleError::MissingField {
            pid: self.pid,
            field: "VmRSS",
        })?;
        Ok(Payload::ResidentSet {
            rss: kb.saturating_mul(1024),
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn sample(&mut self) -> SampleResult<Payload> {
        Err(SampleError::ProcessGone { pid: self.pid })
    }
}

#[cfg(target_os = "linux")]
fn map_proc_error(pid: u32, err: procfs::ProcError) -> SampleError {
    use procfs::ProcError;

    match err {
        ProcError::NotFound(_) => SampleError::ProcessGone { pid },
        ProcError::PermissionDenied(_) => SampleError::PermissionDenied { pid },
        ProcError::Io(source, path) => SampleError::Io {
            path: path.unwrap_or_default(),
            source,
        },
        other => SampleError::Os {
            pid,
            message: other.to_string(),
        },
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_samples_current_process() {
        let mut sampler = ResidentSetSampler::open(Path::new("/proc"), std::process::id()).unwrap();
        match sampler.sample().unwrap() {
            Payload::ResidentSet { rss } => assert!(rss > 0),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_process_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(ResidentSetSampler::open(root.path(), 999_999).is_err());
    }
}
