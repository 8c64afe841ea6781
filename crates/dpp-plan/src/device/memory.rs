//! Budgeted device memory pool.
//!
//! Every scratch buffer a plan owns is a [`DeviceBuffer`] drawn from a
//! [`DeviceMemory`] pool. Allocation either succeeds completely or leaves
//! the pool untouched; dropping the buffer returns its bytes exactly once.
//!
//! The pool is host-backed: buffer contents live in host memory while the
//! accounting follows the device budget and alignment rules.

use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DeviceConfig;
use crate::error::{PlanError, PlanResult};

/// Statistics about pool usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total bytes allocated (after alignment).
    pub total_allocated: usize,
    /// Total budget in bytes.
    pub total_budget: usize,
    /// Number of live buffers.
    pub allocation_count: usize,
    /// Peak usage in bytes.
    pub peak_usage: usize,
}

impl MemoryStats {
    /// Get usage as percentage (0-100).
    pub fn usage_percent(&self) -> f32 {
        if self.total_budget > 0 {
            (self.total_allocated as f32 / self.total_budget as f32) * 100.0
        } else {
            0.0
        }
    }

    /// Get available bytes.
    pub fn available(&self) -> usize {
        self.total_budget.saturating_sub(self.total_allocated)
    }
}

/// Internal pool state (behind Mutex).
struct PoolInner {
    config: DeviceConfig,
    allocations: HashMap<u64, (usize, &'static str)>,
    total_allocated: usize,
    peak_usage: usize,
    next_id: u64,
}

impl PoolInner {
    fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            allocations: HashMap::new(),
            total_allocated: 0,
            peak_usage: 0,
            next_id: 1,
        }
    }

    fn reserve(&mut self, reserved: usize, label: &'static str) -> PlanResult<u64> {
        let new_total = self.total_allocated.saturating_add(reserved);
        if new_total > self.config.memory_budget_bytes {
            return Err(PlanError::AllocationFailed {
                label,
                requested: reserved,
                used: self.total_allocated,
                budget: self.config.memory_budget_bytes,
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        self.allocations.insert(id, (reserved, label));
        self.total_allocated = new_total;
        self.peak_usage = self.peak_usage.max(self.total_allocated);
        Ok(id)
    }

    fn free(&mut self, id: u64) {
        if let Some((reserved, _)) = self.allocations.remove(&id) {
            self.total_allocated = self.total_allocated.saturating_sub(reserved);
        }
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_allocated: self.total_allocated,
            total_budget: self.config.memory_budget_bytes,
            allocation_count: self.allocations.len(),
            peak_usage: self.peak_usage,
        }
    }

    fn align(&self, bytes: usize) -> usize {
        let mask = self.config.alignment - 1;
        bytes.saturating_add(mask) & !mask
    }
}

/// Scratch buffer drawn from a [`DeviceMemory`] pool.
///
/// When dropped, automatically returns its bytes to the pool.
pub struct DeviceBuffer {
    id: u64,
    reserved: usize,
    label: &'static str,
    data: Vec<u8>,
    pool: Arc<Mutex<PoolInner>>,
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("len", &self.data.len())
            .field("reserved", &self.reserved)
            .finish()
    }
}

impl DeviceBuffer {
    /// Requested size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes charged against the pool (size rounded up to the alignment).
    #[inline]
    pub fn reserved_bytes(&self) -> usize {
        self.reserved
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw buffer contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy typed host data into the start of the buffer.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::IllegalConfiguration` if `src` does not fit.
    pub fn copy_from_host<T: bytemuck::Pod>(&mut self, src: &[T]) -> PlanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(src);
        if bytes.len() > self.data.len() {
            return Err(PlanError::illegal(format!(
                "{} bytes do not fit in buffer '{}' of {} bytes",
                bytes.len(),
                self.label,
                self.data.len()
            )));
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Read the buffer back as typed elements. Trailing bytes that do not
    /// form a whole element are ignored.
    pub fn to_host<T: bytemuck::Pod>(&self) -> Vec<T> {
        if size_of::<T>() == 0 {
            return Vec::new();
        }
        self.data
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned::<T>)
            .collect()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.pool.lock().free(self.id);
        debug!(
            buffer = self.label,
            id = self.id,
            bytes = self.reserved,
            "Device buffer released"
        );
    }
}

/// Device memory pool with budget tracking.
///
/// Cloning shares the pool, which is how several instances on one device
/// draw from the same budget.
///
/// # Example
///
/// ```rust
/// use dpp_plan::config::DeviceConfig;
/// use dpp_plan::device::DeviceMemory;
///
/// let memory = DeviceMemory::new(DeviceConfig::with_budget(4096)).unwrap();
/// let buffer = memory.allocate(100, "example").unwrap();
/// assert_eq!(buffer.len(), 100);
/// assert_eq!(memory.used(), 256);
///
/// drop(buffer);
/// assert_eq!(memory.used(), 0);
/// ```
#[derive(Clone)]
pub struct DeviceMemory {
    inner: Arc<Mutex<PoolInner>>,
}

impl DeviceMemory {
    /// Create a new pool.
    ///
    /// # Errors
    ///
    /// Returns error if config validation fails.
    pub fn new(config: DeviceConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PoolInner::new(config))),
        })
    }

    /// Allocate a zero-filled buffer of `bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::AllocationFailed` if the aligned size exceeds the
    /// remaining budget. The pool is unchanged in that case.
    pub fn allocate(&self, bytes: usize, label: &'static str) -> PlanResult<DeviceBuffer> {
        let (id, reserved) = {
            let mut inner = self.inner.lock();
            let reserved = inner.align(bytes);
            (inner.reserve(reserved, label)?, reserved)
        };

        debug!(buffer = label, id, bytes, reserved, "Device buffer allocated");

        Ok(DeviceBuffer {
            id,
            reserved,
            label,
            data: vec![0u8; bytes],
            pool: Arc::clone(&self.inner),
        })
    }

    /// Allocate room for `count` elements of `elem_size` bytes each.
    pub fn allocate_elements(
        &self,
        count: usize,
        elem_size: usize,
        label: &'static str,
    ) -> PlanResult<DeviceBuffer> {
        let bytes = count.checked_mul(elem_size).ok_or_else(|| {
            PlanError::illegal(format!(
                "{} elements of {} bytes overflow the address space",
                count, elem_size
            ))
        })?;
        self.allocate(bytes, label)
    }

    /// Get used memory in bytes.
    pub fn used(&self) -> usize {
        self.inner.lock().total_allocated
    }

    /// Get total budget in bytes.
    pub fn budget(&self) -> usize {
        self.inner.lock().config.memory_budget_bytes
    }

    /// Get available memory in bytes.
    pub fn available(&self) -> usize {
        self.stats().available()
    }

    pub fn device_id(&self) -> u32 {
        self.inner.lock().config.device_id
    }

    /// Get memory statistics.
    pub fn stats(&self) -> MemoryStats {
        self.inner.lock().stats()
    }
}

impl fmt::Debug for DeviceMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("DeviceMemory")
            .field("used", &stats.total_allocated)
            .field("budget", &stats.total_budget)
            .field("allocations", &stats.allocation_count)
            .field("peak", &stats.peak_usage)
            .finish()
    }
}
