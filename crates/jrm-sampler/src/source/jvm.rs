//! Heap and non-heap usage over the JVM instrumentation channel.

use std::sync::Arc;

use jrm_core::{JvmMemory, SampleResult};

use crate::channel::{ChannelCache, ChannelHandle};
use crate::gate::Sampler;

/// Reads memory usage through a cached channel handle.
#[derive(Debug)]
pub struct JvmSampler {
    handle: ChannelHandle,
}

impl JvmSampler {
    /// Acquires (or reuses) the channel of `pid`.
    ///
    /// # Errors
    ///
    /// Fails if the channel cannot be acquired.
    pub fn open(channels: &Arc<ChannelCache>, pid: u32) -> SampleResult<Self> {
        let handle = channels.get_or_acquire(pid)?;
        Ok(Self { handle })
    }
}

impl Sampler for JvmSampler {
    type Output = JvmMemory;

    fn sample(&mut self) -> SampleResult<JvmMemory> {
        Ok(self.handle.memory()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeJvm;

    #[test]
    fn test_samples_through_channel() {
        let jvm = FakeJvm::new();
        let channels = Arc::new(ChannelCache::new(jvm.provider()));

        let mut sampler = JvmSampler::open(&channels, 5).unwrap();
        jvm.set_heap_used(1000);
        let memory = sampler.sample().unwrap();

        assert_eq!(memory.heap_used, 1000);
        assert_eq!(memory.heap_committed, 2000);
        assert_eq!(memory.non_heap_used, 16 * 1024 * 1024);
    }

    #[test]
    fn test_open_fails_without_channel() {
        let jvm = FakeJvm::new().failing_attach();
        let channels = Arc::new(ChannelCache::new(jvm.provider()));

        assert!(JvmSampler::open(&channels, 5).is_err());
    }
}
