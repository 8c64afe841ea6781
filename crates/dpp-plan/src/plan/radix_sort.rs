//! Radix sort plans.
//!
//! Each sort block handles `2 * SORT_CTA_SIZE` keys and produces one counter
//! per digit bucket. The counters of all blocks are scanned to find every
//! bucket's global offset, which is what the nested scan is for.

use crate::constants::{RADIX_BUCKETS, SORT_CTA_SIZE};
use crate::device::DeviceBuffer;
use crate::error::PlanResult;
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration, DataType, Operator, Options};

use super::{impl_plan_kind, reserved_bytes, AlgorithmPlan, PlanBuilder};

/// Number of sort blocks needed for `num_elements` keys.
pub fn radix_blocks(num_elements: usize) -> usize {
    num_elements.div_ceil(2 * SORT_CTA_SIZE)
}

/// Keys-only mode is selected when the options are exactly `KEYS_ONLY`.
pub fn is_keys_only(options: Options) -> bool {
    options == Options::KEYS_ONLY
}

#[derive(Debug)]
pub struct RadixSortStorage {
    temp_keys: DeviceBuffer,
    temp_values: Option<DeviceBuffer>,
    counters: DeviceBuffer,
    counters_sum: DeviceBuffer,
    block_offsets: DeviceBuffer,
}

impl RadixSortStorage {
    pub fn temp_keys(&self) -> &DeviceBuffer {
        &self.temp_keys
    }

    /// Absent for keys-only sorts.
    pub fn temp_values(&self) -> Option<&DeviceBuffer> {
        self.temp_values.as_ref()
    }

    pub fn counters(&self) -> &DeviceBuffer {
        &self.counters
    }

    pub fn counters_sum(&self) -> &DeviceBuffer {
        &self.counters_sum
    }

    pub fn block_offsets(&self) -> &DeviceBuffer {
        &self.block_offsets
    }

    fn buffers(&self) -> impl Iterator<Item = &DeviceBuffer> {
        [
            &self.temp_keys,
            &self.counters,
            &self.counters_sum,
            &self.block_offsets,
        ]
        .into_iter()
        .chain(self.temp_values.as_ref())
    }
}

#[derive(Debug)]
pub struct RadixSortPlan {
    scan_plan: PlanHandle,
    keys_only: bool,
    num_blocks: usize,
    storage: Option<RadixSortStorage>,
}

impl RadixSortPlan {
    /// Configuration of the nested counter scan.
    pub const SCAN_CONFIG: Configuration = Configuration::new(
        Algorithm::Scan,
        Operator::Add,
        DataType::UInt,
        Options::FORWARD.union(Options::EXCLUSIVE),
    );

    pub(crate) fn build(
        builder: &mut PlanBuilder<'_>,
        handle: PlanHandle,
        config: &Configuration,
        num_elements: usize,
    ) -> PlanResult<Self> {
        let num_blocks = radix_blocks(num_elements);
        let keys_only = is_keys_only(config.options);
        let counter_elements = num_blocks * RADIX_BUCKETS;

        let scan_plan = builder.build(Some(handle), Self::SCAN_CONFIG, counter_elements, 1, 0)?;

        let memory = builder.memory();
        let temp_keys = memory.allocate_elements(
            num_elements,
            config.datatype.size_bytes(),
            "radix_sort.temp_keys",
        )?;
        let temp_values = if keys_only {
            None
        } else {
            Some(memory.allocate_elements(num_elements, 4, "radix_sort.temp_values")?)
        };
        let counters = memory.allocate_elements(counter_elements, 4, "radix_sort.counters")?;
        let counters_sum =
            memory.allocate_elements(counter_elements, 4, "radix_sort.counters_sum")?;
        let block_offsets =
            memory.allocate_elements(counter_elements, 4, "radix_sort.block_offsets")?;

        Ok(Self {
            scan_plan,
            keys_only,
            num_blocks,
            storage: Some(RadixSortStorage {
                temp_keys,
                temp_values,
                counters,
                counters_sum,
                block_offsets,
            }),
        })
    }

    pub fn scan_plan(&self) -> PlanHandle {
        self.scan_plan
    }

    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }

    /// Sort blocks of `2 * SORT_CTA_SIZE` keys.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    pub fn storage(&self) -> Option<&RadixSortStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for RadixSortPlan {
    const ALGORITHM: Algorithm = Algorithm::RadixSort;

    impl_plan_kind!(RadixSort);

    fn nested_plan(&self) -> Option<PlanHandle> {
        Some(self.scan_plan)
    }

    fn scratch_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| reserved_bytes(s.buffers()))
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage.take().map(|_| self.scan_plan)
    }
}
