//! Reduction plans.

use crate::constants::{REDUCE_CTA_SIZE, REDUCE_MAX_BLOCKS};
use crate::device::{DeviceBuffer, DeviceMemory};
use crate::error::PlanResult;
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration};

use super::{impl_plan_kind, AlgorithmPlan};

#[derive(Debug)]
pub struct ReduceStorage {
    block_sums: DeviceBuffer,
}

impl ReduceStorage {
    /// One partial result per block, `max_blocks` entries.
    pub fn block_sums(&self) -> &DeviceBuffer {
        &self.block_sums
    }
}

/// Fixed-size accumulator; independent of the element count.
#[derive(Debug)]
pub struct ReducePlan {
    threads_per_block: usize,
    max_blocks: usize,
    storage: Option<ReduceStorage>,
}

impl ReducePlan {
    pub(crate) fn allocate(memory: &DeviceMemory, config: &Configuration) -> PlanResult<Self> {
        let block_sums = memory.allocate_elements(
            REDUCE_MAX_BLOCKS,
            config.datatype.size_bytes(),
            "reduce.block_sums",
        )?;
        Ok(Self {
            threads_per_block: REDUCE_CTA_SIZE,
            max_blocks: REDUCE_MAX_BLOCKS,
            storage: Some(ReduceStorage { block_sums }),
        })
    }

    pub fn threads_per_block(&self) -> usize {
        self.threads_per_block
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    pub fn storage(&self) -> Option<&ReduceStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for ReducePlan {
    const ALGORITHM: Algorithm = Algorithm::Reduce;

    impl_plan_kind!(Reduce);

    fn scratch_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| s.block_sums.reserved_bytes())
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage = None;
        None
    }
}
