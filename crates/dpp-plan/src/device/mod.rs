//! Device storage collaborator.
//!
//! Plans never talk to an allocator directly; they draw scratch buffers
//! from a [`DeviceMemory`] pool and hold them as RAII [`DeviceBuffer`]s.

mod memory;

pub use memory::{DeviceBuffer, DeviceMemory, MemoryStats};
