//! Plans: configuration plus the scratch storage one algorithm needs.
//!
//! Every plan shares the [`Plan`] header (handle, owner, configuration and
//! sizes). The algorithm-specific part is the closed [`PlanKind`] variant;
//! each concrete plan implements [`AlgorithmPlan`].
//!
//! # Composition
//!
//! ```text
//! Compact    ──owns──> Scan            (n, rows, pitch)
//! RadixSort  ──owns──> Scan            (ceil(n / 1024) * 16, 1, 0)
//! SpMV       ──owns──> SegmentedScan   (nnz, 1, 0)
//! ```
//!
//! Nested plans are registered in the same handle table as their parent and
//! record the parent as their owner. No nested plan owns another plan.
//!
//! # Module Structure
//!
//! - [`scan`]: hierarchical block-sum layout and scan plans
//! - [`segmented_scan`]: scan storage plus per-element flags and head indices
//! - [`compact`]: output index buffer over a nested scan
//! - [`radix_sort`]: digit counters over a nested scan
//! - [`reduce`]: fixed-size accumulator
//! - [`spmv`]: CSR matrix storage over a nested segmented scan
//! - [`rand`]: seed state
//! - `builder`: transactional construction and registration

mod builder;
pub mod compact;
pub mod radix_sort;
pub mod rand;
pub mod reduce;
pub mod scan;
pub mod segmented_scan;
pub mod spmv;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceBuffer;
use crate::handle::{InstanceId, PlanHandle};
use crate::types::{Algorithm, Configuration};

pub(crate) use builder::PlanBuilder;

pub use compact::{CompactPlan, CompactStorage};
pub use radix_sort::{RadixSortPlan, RadixSortStorage};
pub use rand::RandPlan;
pub use reduce::{ReducePlan, ReduceStorage};
pub use scan::{ScanLayout, ScanPlan, ScanStorage};
pub use segmented_scan::{SegmentedScanPlan, SegmentedScanStorage};
pub use spmv::{SparseMatrix, SparseMatrixVectorMultiplyPlan, SparseMatrixVectorMultiplyStorage};

/// Behaviour shared by every concrete plan.
pub trait AlgorithmPlan: fmt::Debug + Sized {
    /// Algorithm tag this plan is built for.
    const ALGORITHM: Algorithm;

    fn from_kind(kind: &PlanKind) -> Option<&Self>;

    fn from_kind_mut(kind: &mut PlanKind) -> Option<&mut Self>;

    /// Nested plan this plan owns, if any.
    fn nested_plan(&self) -> Option<PlanHandle> {
        None
    }

    /// Bytes of device storage currently held (after alignment).
    fn scratch_bytes(&self) -> usize;

    /// Free the scratch storage.
    ///
    /// Returns the nested plan handle the first time storage is freed and
    /// `None` afterwards, so the caller destroys the nested plan exactly once.
    fn release(&mut self) -> Option<PlanHandle>;
}

/// Algorithm-specific part of a plan.
#[derive(Debug)]
pub enum PlanKind {
    Scan(ScanPlan),
    SegmentedScan(SegmentedScanPlan),
    Compact(CompactPlan),
    Reduce(ReducePlan),
    RadixSort(RadixSortPlan),
    SparseMatrixVectorMultiply(SparseMatrixVectorMultiplyPlan),
    Rand(RandPlan),
}

macro_rules! dispatch {
    ($kind:expr, $plan:ident => $body:expr) => {
        match $kind {
            PlanKind::Scan($plan) => $body,
            PlanKind::SegmentedScan($plan) => $body,
            PlanKind::Compact($plan) => $body,
            PlanKind::Reduce($plan) => $body,
            PlanKind::RadixSort($plan) => $body,
            PlanKind::SparseMatrixVectorMultiply($plan) => $body,
            PlanKind::Rand($plan) => $body,
        }
    };
}

impl PlanKind {
    /// Algorithm tag of the variant.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PlanKind::Scan(_) => Algorithm::Scan,
            PlanKind::SegmentedScan(_) => Algorithm::SegmentedScan,
            PlanKind::Compact(_) => Algorithm::Compact,
            PlanKind::Reduce(_) => Algorithm::Reduce,
            PlanKind::RadixSort(_) => Algorithm::RadixSort,
            PlanKind::SparseMatrixVectorMultiply(_) => Algorithm::SparseMatrixVectorMultiply,
            PlanKind::Rand(_) => Algorithm::Rand,
        }
    }

    pub fn nested_plan(&self) -> Option<PlanHandle> {
        dispatch!(self, plan => plan.nested_plan())
    }

    pub fn scratch_bytes(&self) -> usize {
        dispatch!(self, plan => plan.scratch_bytes())
    }

    fn release(&mut self) -> Option<PlanHandle> {
        dispatch!(self, plan => plan.release())
    }
}

/// A registered plan.
#[derive(Debug)]
pub struct Plan {
    handle: PlanHandle,
    owner: Option<PlanHandle>,
    config: Configuration,
    num_elements: usize,
    num_rows: usize,
    row_pitch: usize,
    kind: PlanKind,
}

impl Plan {
    pub(crate) fn new(
        handle: PlanHandle,
        owner: Option<PlanHandle>,
        config: Configuration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
        kind: PlanKind,
    ) -> Self {
        debug_assert_eq!(config.algorithm, kind.algorithm());
        Self {
            handle,
            owner,
            config,
            num_elements,
            num_rows,
            row_pitch,
            kind,
        }
    }

    #[inline]
    pub fn handle(&self) -> PlanHandle {
        self.handle
    }

    #[inline]
    pub fn instance(&self) -> InstanceId {
        self.handle.instance()
    }

    /// Parent plan, for plans built as part of another plan.
    #[inline]
    pub fn owner(&self) -> Option<PlanHandle> {
        self.owner
    }

    #[inline]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm
    }

    /// Maximum number of elements the plan was sized for.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    #[inline]
    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    pub fn nested_plan(&self) -> Option<PlanHandle> {
        self.kind.nested_plan()
    }

    pub fn scratch_bytes(&self) -> usize {
        self.kind.scratch_bytes()
    }

    /// Downcast to a concrete plan.
    pub fn downcast<P: AlgorithmPlan>(&self) -> Option<&P> {
        P::from_kind(&self.kind)
    }

    pub fn downcast_mut<P: AlgorithmPlan>(&mut self) -> Option<&mut P> {
        P::from_kind_mut(&mut self.kind)
    }

    pub(crate) fn release(&mut self) -> Option<PlanHandle> {
        self.kind.release()
    }

    /// Serialisable summary of this plan.
    pub fn info(&self) -> PlanInfo {
        PlanInfo {
            handle: self.handle,
            algorithm: self.algorithm(),
            num_elements: self.num_elements,
            num_rows: self.num_rows,
            row_pitch: self.row_pitch,
            scratch_bytes: self.scratch_bytes(),
            nested: self.nested_plan(),
            owner: self.owner,
        }
    }
}

/// Summary of a plan for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInfo {
    pub handle: PlanHandle,
    pub algorithm: Algorithm,
    pub num_elements: usize,
    pub num_rows: usize,
    pub row_pitch: usize,
    pub scratch_bytes: usize,
    pub nested: Option<PlanHandle>,
    pub owner: Option<PlanHandle>,
}

/// Sum of the pool charges of a set of buffers.
pub(crate) fn reserved_bytes<'a>(buffers: impl IntoIterator<Item = &'a DeviceBuffer>) -> usize {
    buffers.into_iter().map(DeviceBuffer::reserved_bytes).sum()
}

/// Implements the downcast half of [`AlgorithmPlan`] for a `PlanKind` variant.
macro_rules! impl_plan_kind {
    ($variant:ident) => {
        fn from_kind(kind: &$crate::plan::PlanKind) -> Option<&Self> {
            match kind {
                $crate::plan::PlanKind::$variant(plan) => Some(plan),
                _ => None,
            }
        }

        fn from_kind_mut(kind: &mut $crate::plan::PlanKind) -> Option<&mut Self> {
            match kind {
                $crate::plan::PlanKind::$variant(plan) => Some(plan),
                _ => None,
            }
        }
    };
}

pub(crate) use impl_plan_kind;
