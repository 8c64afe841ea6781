//! Kernel geometry constants.
//!
//! These values must match the launch configuration of the compute kernels
//! that consume the plans; they fix every scratch buffer size.

/// Threads per block for the scan kernels.
pub const SCAN_CTA_SIZE: usize = 128;

/// Elements processed per scan thread.
pub const SCAN_ELTS_PER_THREAD: usize = 8;

/// Elements covered by one scan block (1024).
pub const SCAN_TILE_ELEMENTS: usize = SCAN_CTA_SIZE * SCAN_ELTS_PER_THREAD;

/// Threads per block for the segmented scan kernels.
pub const SEGSCAN_CTA_SIZE: usize = 128;

/// Elements processed per segmented scan thread.
pub const SEGSCAN_ELTS_PER_THREAD: usize = 8;

/// Elements covered by one segmented scan block.
pub const SEGSCAN_TILE_ELEMENTS: usize = SEGSCAN_CTA_SIZE * SEGSCAN_ELTS_PER_THREAD;

/// Threads per block for radix sort. Each block sorts `2 * SORT_CTA_SIZE` keys.
pub const SORT_CTA_SIZE: usize = 512;

/// Digit buckets per radix pass (4-bit digits).
pub const RADIX_BUCKETS: usize = 16;

/// Threads per block for reduction.
pub const REDUCE_CTA_SIZE: usize = 256;

/// Upper bound on reduction blocks; fixes the accumulator size.
pub const REDUCE_MAX_BLOCKS: usize = 64;

/// Per-level row pitches of multi-row scans are padded to this many elements.
pub const ROW_PITCH_ALIGNMENT: usize = 16;

/// Seed a freshly created rand plan starts from.
pub const DEFAULT_RAND_SEED: u32 = 0;
