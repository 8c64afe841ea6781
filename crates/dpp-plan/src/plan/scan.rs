//! Scan plans and the hierarchical block-sum layout shared with segmented scan.
//!
//! A scan over `n` elements runs in tiles of [`SCAN_TILE_ELEMENTS`]. Each
//! tile leaves one partial sum behind, those partial sums are scanned again,
//! and so on until a single tile covers everything. Every level that still
//! has more than one block needs a buffer for its block sums.

use serde::{Deserialize, Serialize};

use crate::constants::{ROW_PITCH_ALIGNMENT, SCAN_TILE_ELEMENTS};
use crate::device::{DeviceBuffer, DeviceMemory};
use crate::error::{PlanError, PlanResult};
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration, DataType};

use super::{impl_plan_kind, reserved_bytes, AlgorithmPlan};

/// Block counts and row pitches of every block-sum level.
///
/// # Example
///
/// ```
/// use dpp_plan::plan::ScanLayout;
///
/// let layout = ScanLayout::new(1025, 1, 0, 1024);
/// assert_eq!(layout.level_blocks(), &[2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLayout {
    level_blocks: Vec<usize>,
    row_pitches: Vec<usize>,
    num_rows: usize,
}

impl ScanLayout {
    pub fn new(num_elements: usize, num_rows: usize, row_pitch: usize, tile: usize) -> Self {
        let mut level_blocks = Vec::new();
        let mut elements = num_elements;
        loop {
            let blocks = elements.div_ceil(tile).max(1);
            if blocks > 1 {
                level_blocks.push(blocks);
            }
            elements = blocks;
            if elements <= 1 {
                break;
            }
        }

        let row_pitches = if num_rows > 1 {
            std::iter::once(row_pitch)
                .chain(
                    level_blocks
                        .iter()
                        .map(|blocks| blocks.next_multiple_of(ROW_PITCH_ALIGNMENT)),
                )
                .collect()
        } else {
            Vec::new()
        };

        Self {
            level_blocks,
            row_pitches,
            num_rows,
        }
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.level_blocks.len()
    }

    /// Blocks per level, finest level first.
    #[inline]
    pub fn level_blocks(&self) -> &[usize] {
        &self.level_blocks
    }

    /// Caller row pitch followed by the padded pitch of each level.
    /// Empty for single-row scans.
    #[inline]
    pub fn row_pitches(&self) -> &[usize] {
        &self.row_pitches
    }

    /// Elements of block-sum storage needed at `level`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::IllegalConfiguration`] if `level` is not a level
    /// of this layout or the padded rows overflow `usize`.
    pub fn level_elements(&self, level: usize) -> PlanResult<usize> {
        let blocks = self.level_blocks.get(level).copied().ok_or_else(|| {
            PlanError::illegal(format!(
                "scan level {} out of range, layout has {} levels",
                level,
                self.num_levels()
            ))
        })?;
        if self.num_rows <= 1 {
            return Ok(blocks);
        }
        let pitch = blocks.next_multiple_of(ROW_PITCH_ALIGNMENT);
        pitch.checked_mul(self.num_rows).ok_or_else(|| {
            PlanError::illegal(format!(
                "{} rows of {} block sums overflow the address space",
                self.num_rows, pitch
            ))
        })
    }

    pub(crate) fn allocate_block_sums(
        &self,
        memory: &DeviceMemory,
        datatype: DataType,
        label: &'static str,
    ) -> PlanResult<Vec<DeviceBuffer>> {
        (0..self.num_levels())
            .map(|level| {
                memory.allocate_elements(self.level_elements(level)?, datatype.size_bytes(), label)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct ScanStorage {
    block_sums: Vec<DeviceBuffer>,
}

impl ScanStorage {
    /// One buffer per layout level.
    pub fn block_sums(&self) -> &[DeviceBuffer] {
        &self.block_sums
    }
}

#[derive(Debug)]
pub struct ScanPlan {
    layout: ScanLayout,
    storage: Option<ScanStorage>,
}

impl ScanPlan {
    pub(crate) fn allocate(
        memory: &DeviceMemory,
        config: &Configuration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
    ) -> PlanResult<Self> {
        let layout = ScanLayout::new(num_elements, num_rows, row_pitch, SCAN_TILE_ELEMENTS);
        let block_sums = layout.allocate_block_sums(memory, config.datatype, "scan.block_sums")?;
        Ok(Self {
            layout,
            storage: Some(ScanStorage { block_sums }),
        })
    }

    pub fn layout(&self) -> &ScanLayout {
        &self.layout
    }

    /// `None` once the plan has been released.
    pub fn storage(&self) -> Option<&ScanStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for ScanPlan {
    const ALGORITHM: Algorithm = Algorithm::Scan;

    impl_plan_kind!(Scan);

    fn scratch_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| reserved_bytes(&s.block_sums))
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage = None;
        None
    }
}
