//! Stream compaction plans.
//!
//! Compaction scans the validity flags to find each kept element's output
//! slot, so the plan owns an exclusive `UInt` scan over the same shape.

use crate::device::DeviceBuffer;
use crate::error::PlanResult;
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration, DataType, Operator, Options};

use super::{impl_plan_kind, AlgorithmPlan, PlanBuilder};

#[derive(Debug)]
pub struct CompactStorage {
    output_indices: DeviceBuffer,
}

impl CompactStorage {
    /// Output slot of every input element (`u32` each).
    pub fn output_indices(&self) -> &DeviceBuffer {
        &self.output_indices
    }
}

#[derive(Debug)]
pub struct CompactPlan {
    scan_plan: PlanHandle,
    storage: Option<CompactStorage>,
}

impl CompactPlan {
    /// Configuration of the nested scan: exclusive add over `UInt`, in the
    /// direction the caller asked for.
    pub fn scan_config(config: &Configuration) -> Configuration {
        let direction = if config.options.contains(Options::BACKWARD) {
            Options::BACKWARD
        } else {
            Options::FORWARD
        };
        Configuration::new(
            Algorithm::Scan,
            Operator::Add,
            DataType::UInt,
            Options::EXCLUSIVE | direction,
        )
    }

    pub(crate) fn build(
        builder: &mut PlanBuilder<'_>,
        handle: PlanHandle,
        config: &Configuration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
    ) -> PlanResult<Self> {
        let scan_plan = builder.build(
            Some(handle),
            Self::scan_config(config),
            num_elements,
            num_rows,
            row_pitch,
        )?;
        let output_indices =
            builder
                .memory()
                .allocate_elements(num_elements, 4, "compact.output_indices")?;

        Ok(Self {
            scan_plan,
            storage: Some(CompactStorage { output_indices }),
        })
    }

    pub fn scan_plan(&self) -> PlanHandle {
        self.scan_plan
    }

    pub fn storage(&self) -> Option<&CompactStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for CompactPlan {
    const ALGORITHM: Algorithm = Algorithm::Compact;

    impl_plan_kind!(Compact);

    fn nested_plan(&self) -> Option<PlanHandle> {
        Some(self.scan_plan)
    }

    fn scratch_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| s.output_indices.reserved_bytes())
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage.take().map(|_| self.scan_plan)
    }
}
