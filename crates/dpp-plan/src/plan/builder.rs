//! Transactional plan construction.
//!
//! A [`PlanBuilder`] lives for one `create_*` call. Every plan it registers
//! is removed again, in reverse order, unless [`PlanBuilder::commit`] runs.
//! Removing a plan drops its buffers, so a failed call leaves the handle
//! table and the device pool as they were before it.

use tracing::{debug, warn};

use crate::device::DeviceMemory;
use crate::error::{PlanError, PlanResult};
use crate::handle::{HandleTable, PlanHandle};
use crate::types::{Algorithm, Configuration, Element};

use super::compact::CompactPlan;
use super::radix_sort::RadixSortPlan;
use super::rand::RandPlan;
use super::reduce::ReducePlan;
use super::scan::ScanPlan;
use super::segmented_scan::SegmentedScanPlan;
use super::spmv::{SparseMatrix, SparseMatrixVectorMultiplyPlan};
use super::{Plan, PlanKind};

pub(crate) struct PlanBuilder<'a> {
    memory: &'a DeviceMemory,
    table: &'a mut HandleTable,
    registered: Vec<PlanHandle>,
    committed: bool,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(memory: &'a DeviceMemory, table: &'a mut HandleTable) -> Self {
        Self {
            memory,
            table,
            registered: Vec::new(),
            committed: false,
        }
    }

    pub(crate) fn memory(&self) -> &'a DeviceMemory {
        self.memory
    }

    /// Build and register a plan for any algorithm that needs no input data.
    ///
    /// The handle is drawn before nested plans are built so they can record
    /// it as their owner.
    pub(crate) fn build(
        &mut self,
        owner: Option<PlanHandle>,
        config: Configuration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
    ) -> PlanResult<PlanHandle> {
        let handle = self.table.reserve()?;
        let memory = self.memory;

        let (kind, num_rows, row_pitch) = match config.algorithm {
            Algorithm::Scan => (
                PlanKind::Scan(ScanPlan::allocate(
                    memory,
                    &config,
                    num_elements,
                    num_rows,
                    row_pitch,
                )?),
                num_rows,
                row_pitch,
            ),
            Algorithm::SegmentedScan => (
                PlanKind::SegmentedScan(SegmentedScanPlan::allocate(memory, &config, num_elements)?),
                1,
                0,
            ),
            Algorithm::Compact => (
                PlanKind::Compact(CompactPlan::build(
                    self,
                    handle,
                    &config,
                    num_elements,
                    num_rows,
                    row_pitch,
                )?),
                num_rows,
                row_pitch,
            ),
            Algorithm::RadixSort => (
                PlanKind::RadixSort(RadixSortPlan::build(self, handle, &config, num_elements)?),
                1,
                0,
            ),
            Algorithm::Reduce => (
                PlanKind::Reduce(ReducePlan::allocate(memory, &config)?),
                1,
                0,
            ),
            Algorithm::Rand => (PlanKind::Rand(RandPlan::new()), 1, 0),
            Algorithm::SparseMatrixVectorMultiply => {
                return Err(PlanError::illegal(
                    "sparse matrix plans need matrix data; use create_sparse_matrix_object",
                ));
            }
        };

        Ok(self.register(Plan::new(
            handle,
            owner,
            config,
            num_elements,
            num_rows,
            row_pitch,
            kind,
        )))
    }

    /// Build and register a sparse matrix plan from CSR data.
    pub(crate) fn build_sparse_matrix<T: Element>(
        &mut self,
        config: Configuration,
        matrix: &SparseMatrix<'_, T>,
    ) -> PlanResult<PlanHandle> {
        let handle = self.table.reserve()?;
        let plan = SparseMatrixVectorMultiplyPlan::build(self, handle, &config, matrix)?;

        Ok(self.register(Plan::new(
            handle,
            None,
            config,
            matrix.num_non_zero(),
            matrix.num_rows(),
            0,
            PlanKind::SparseMatrixVectorMultiply(plan),
        )))
    }

    fn register(&mut self, plan: Plan) -> PlanHandle {
        let handle = plan.handle();
        debug!(
            handle = %handle,
            algorithm = plan.algorithm().name(),
            owner = ?plan.owner(),
            scratch_bytes = plan.scratch_bytes(),
            "Plan registered"
        );
        self.table.insert(plan);
        self.registered.push(handle);
        handle
    }

    /// Keep everything registered so far.
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PlanBuilder<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(handle) = self.registered.pop() {
            if let Some(plan) = self.table.remove(handle) {
                warn!(
                    handle = %handle,
                    algorithm = plan.algorithm().name(),
                    scratch_bytes = plan.scratch_bytes(),
                    "Rolling back partially constructed plan"
                );
            }
        }
    }
}
