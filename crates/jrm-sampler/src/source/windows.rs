//! Windows memory counters via `GetProcessMemoryInfo`.

use jrm_core::{Payload, SampleError, SampleResult};

use crate::gate::Sampler;

/// Which counter of `PROCESS_MEMORY_COUNTERS_EX2` to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsCounter {
    WorkingSet,
    PrivateWorkingSet,
    PrivateBytes,
}

/// Samples one Windows memory counter of one process.
#[derive(Debug)]
pub struct WindowsCounterSampler {
    pid: u32,
    counter: WindowsCounter,
}

impl WindowsCounterSampler {
    /// Checks that the process can be queried.
    ///
    /// # Errors
    ///
    /// Fails if the process cannot be opened, or on non-Windows hosts.
    pub fn open(pid: u32, counter: WindowsCounter) -> SampleResult<Self> {
        let mut sampler = Self { pid, counter };
        sampler.sample()?;
        Ok(sampler)
    }
}

impl Sampler for WindowsCounterSampler {
    type Output = Payload;

    fn sample(&mut self) -> SampleResult<Payload> {
        let counters = query(self.pid)?;
        Ok(match self.counter {
            WindowsCounter::WorkingSet => Payload::WorkingSet {
                ws: counters.working_set,
            },
            WindowsCounter::PrivateWorkingSet => Payload::PrivateWorkingSet {
                pws: counters.private_working_set,
            },
            WindowsCounter::PrivateBytes => Payload::PrivateBytes {
                pb: counters.private_bytes,
            },
        })
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
struct Counters {
    working_set: u64,
    private_working_set: u64,
    private_bytes: u64,
}

#[cfg(windows)]
fn query(pid: u32) -> SampleResult<Counters> {
    use std::mem;

    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::ProcessStatus::{
        GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS, PROCESS_MEMORY_COUNTERS_EX2,
    };
    use windows_sys::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    // SAFETY: OpenProcess has no memory-safety preconditions; a null
    // handle signals failure and is checked below.
    let handle = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, 0, pid) };
    if handle.is_null() {
        return Err(SampleError::ProcessGone { pid });
    }

    // SAFETY: the struct is plain old data, all-zero is a valid value.
    let mut pmc: PROCESS_MEMORY_COUNTERS_EX2 = unsafe { mem::zeroed() };
    let size = mem::size_of::<PROCESS_MEMORY_COUNTERS_EX2>() as u32;
    pmc.cb = size;

    // SAFETY: `handle` is a live process handle and `pmc` is a writable
    // buffer of `size` bytes whose prefix is PROCESS_MEMORY_COUNTERS.
    let ok = unsafe {
        GetProcessMemoryInfo(
            handle,
            (&mut pmc as *mut PROCESS_MEMORY_COUNTERS_EX2).cast::<PROCESS_MEMORY_COUNTERS>(),
            size,
        )
    };

    // SAFETY: `handle` came from OpenProcess and is closed exactly once.
    unsafe { CloseHandle(handle) };

    if ok == 0 {
        return Err(SampleError::Os {
            pid,
            message: "GetProcessMemoryInfo failed".to_string(),
        });
    }

    Ok(Counters {
        working_set: pmc.WorkingSetSize as u64,
        private_working_set: pmc.PrivateWorkingSetSize as u64,
        private_bytes: pmc.PrivateUsage as u64,
    })
}

#[cfg(not(windows))]
fn query(_pid: u32) -> SampleResult<Counters> {
    Err(SampleError::Unsupported {
        what: "Windows memory counters",
    })
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_off_windows() {
        let err = WindowsCounterSampler::open(std::process::id(), WindowsCounter::WorkingSet).unwrap_err();
        assert!(matches!(err, SampleError::Unsupported { .. }));
    }
}
