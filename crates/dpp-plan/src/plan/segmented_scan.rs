//! Segmented scan plans.

use crate::constants::SEGSCAN_TILE_ELEMENTS;
use crate::device::{DeviceBuffer, DeviceMemory};
use crate::error::PlanResult;
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration};

use super::scan::ScanLayout;
use super::{impl_plan_kind, reserved_bytes, AlgorithmPlan};

#[derive(Debug)]
pub struct SegmentedScanStorage {
    block_sums: Vec<DeviceBuffer>,
    flags: DeviceBuffer,
    head_indices: DeviceBuffer,
}

impl SegmentedScanStorage {
    pub fn block_sums(&self) -> &[DeviceBuffer] {
        &self.block_sums
    }

    /// Per-element segment flags of the top-level pass (`u32` each).
    pub fn flags(&self) -> &DeviceBuffer {
        &self.flags
    }

    /// Per-element segment head indices (`u32` each).
    pub fn head_indices(&self) -> &DeviceBuffer {
        &self.head_indices
    }
}

/// Scan storage plus the per-element segment bookkeeping.
#[derive(Debug)]
pub struct SegmentedScanPlan {
    layout: ScanLayout,
    storage: Option<SegmentedScanStorage>,
}

impl SegmentedScanPlan {
    pub(crate) fn allocate(
        memory: &DeviceMemory,
        config: &Configuration,
        num_elements: usize,
    ) -> PlanResult<Self> {
        let layout = ScanLayout::new(num_elements, 1, 0, SEGSCAN_TILE_ELEMENTS);
        let block_sums =
            layout.allocate_block_sums(memory, config.datatype, "segmented_scan.block_sums")?;
        let flags = memory.allocate_elements(num_elements, 4, "segmented_scan.flags")?;
        let head_indices = memory.allocate_elements(num_elements, 4, "segmented_scan.head_indices")?;

        Ok(Self {
            layout,
            storage: Some(SegmentedScanStorage {
                block_sums,
                flags,
                head_indices,
            }),
        })
    }

    pub fn layout(&self) -> &ScanLayout {
        &self.layout
    }

    pub fn storage(&self) -> Option<&SegmentedScanStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for SegmentedScanPlan {
    const ALGORITHM: Algorithm = Algorithm::SegmentedScan;

    impl_plan_kind!(SegmentedScan);

    fn scratch_bytes(&self) -> usize {
        self.storage.as_ref().map_or(0, |s| {
            reserved_bytes(&s.block_sums) + reserved_bytes([&s.flags, &s.head_indices])
        })
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::types::{DataType, Operator, Options};

    #[test]
    fn test_segmented_scan_storage_sizes() {
        let memory = DeviceMemory::new(DeviceConfig::default()).unwrap();
        let config = Configuration::new(
            Algorithm::SegmentedScan,
            Operator::Max,
            DataType::Int,
            Options::FORWARD | Options::INCLUSIVE,
        );
        let plan = SegmentedScanPlan::allocate(&memory, &config, 3000).unwrap();

        assert_eq!(plan.layout().level_blocks(), &[3]);
        let storage = plan.storage().unwrap();
        assert_eq!(storage.block_sums()[0].len(), 3 * 4);
        assert_eq!(storage.flags().len(), 3000 * 4);
        assert_eq!(storage.head_indices().len(), 3000 * 4);
        assert_eq!(plan.scratch_bytes(), memory.used());
    }

    #[test]
    fn test_segmented_scan_release_frees_everything() {
        let memory = DeviceMemory::new(DeviceConfig::default()).unwrap();
        let config = Configuration::new(
            Algorithm::SegmentedScan,
            Operator::Add,
            DataType::Float,
            Options::NONE,
        );
        let mut plan = SegmentedScanPlan::allocate(&memory, &config, 1 << 16).unwrap();
        assert!(memory.used() > 0);

        plan.release();
        assert_eq!(plan.scratch_bytes(), 0);
        assert_eq!(memory.used(), 0);
    }
}
