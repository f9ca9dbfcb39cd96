//! Proportional and unique set sizes from `/proc/[pid]/smaps`.
//!
//! The file holds one block per mapped region. Each block starts with the
//! region header and a `Size:` line, followed (among others) by `Pss:`,
//! `Private_Clean:` and `Private_Dirty:` lines, all in kB.
//!
//! PSS is already divided among sharers by the kernel, so every `Pss:`
//! value goes straight into the total. Private pages are collected per
//! block and flushed into the USS total when the next block's `Size:` line
//! shows up, plus once after the last block.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use jrm_core::{SampleError, SampleResult, SetBreakdown};
use tracing::trace;

use crate::gate::Sampler;

const SIZE_PREFIX: &str = "Size:";
const PSS_PREFIX: &str = "Pss:";
const PRIVATE_CLEAN_PREFIX: &str = "Private_Clean:";
const PRIVATE_DIRTY_PREFIX: &str = "Private_Dirty:";

/// Running totals while walking a breakdown file.
#[derive(Debug, Default)]
struct BreakdownAccumulator {
    pss: u64,
    uss: u64,
    private_clean: u64,
    private_dirty: u64,
}

impl BreakdownAccumulator {
    fn feed(&mut self, line: &str) {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            return;
        };

        let slot = match key {
            SIZE_PREFIX => {
                self.flush();
                return;
            }
            PSS_PREFIX => &mut self.pss,
            PRIVATE_CLEAN_PREFIX => &mut self.private_clean,
            PRIVATE_DIRTY_PREFIX => &mut self.private_dirty,
            _ => return,
        };

        match fields.next().and_then(|v| v.parse::<u64>().ok()) {
            Some(kb) => *slot = slot.saturating_add(kb.saturating_mul(1024)),
            None => trace!(line, "Skipping malformed breakdown line"),
        }
    }

    fn flush(&mut self) {
        self.uss = self
            .uss
            .saturating_add(self.private_clean)
            .saturating_add(self.private_dirty);
        self.private_clean = 0;
        self.private_dirty = 0;
    }

    fn finish(mut self) -> SetBreakdown {
        self.flush();
        SetBreakdown {
            pss: self.pss,
            uss: self.uss,
        }
    }
}

/// Parses a whole breakdown.
///
/// # Errors
///
/// Any read error aborts the parse; a partial result is never returned.
pub fn parse_breakdown<R: BufRead>(reader: R) -> io::Result<SetBreakdown> {
    let mut acc = BreakdownAccumulator::default();
    for line in reader.lines() {
        acc.feed(&line?);
    }
    Ok(acc.finish())
}

/// Samples the breakdown file of one process.
#[derive(Debug)]
pub struct SmapsSampler {
    pid: u32,
    path: PathBuf,
}

impl SmapsSampler {
    /// Opens the breakdown of `pid` under `proc_root`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or not accessible.
    pub fn open(proc_root: &Path, pid: u32) -> SampleResult<Self> {
        let path = proc_root.join(pid.to_string()).join("smaps");
        fs::metadata(&path).map_err(|e| SampleError::from_io(pid, &path, e))?;
        Ok(Self { pid, path })
    }
}

impl Sampler for SmapsSampler {
    type Output = SetBreakdown;

    fn sample(&mut self) -> SampleResult<SetBreakdown> {
        let file = File::open(&self.path).map_err(|e| SampleError::from_io(self.pid, &self.path, e))?;
        parse_breakdown(BufReader::new(file)).map_err(|e| SampleError::from_io(self.pid, &self.path, e))
    }
}
