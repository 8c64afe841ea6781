//! Handle-based surface with flat status codes.
//!
//! [`Library`] keeps every live instance and routes each request to the
//! instance it names. Handles carry their instance, so destroy calls need
//! only the handle. Failures are reported as a [`ResultCode`] together with
//! [`PlanHandle::INVALID`].

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::ManagerConfig;
use crate::device::{DeviceMemory, MemoryStats};
use crate::error::{PlanError, PlanResult, ResultCode};
use crate::handle::{InstanceId, PlanHandle};
use crate::manager::Manager;
use crate::types::{Configuration, Element, RawConfiguration};

/// Registry of library instances sharing one device pool.
///
/// # Example
///
/// ```
/// use dpp_plan::{Library, ManagerConfig, PlanHandle, RawConfiguration, ResultCode};
///
/// let mut library = Library::new(&ManagerConfig::default()).unwrap();
/// let instance = library.create_instance();
///
/// // Forward | Backward
/// let raw = RawConfiguration { algorithm: 0, operator: 0, datatype: 4, options: 0x3 };
/// let (handle, code) = library.plan(instance, raw, 1024, 1, 0);
/// assert_eq!(code, ResultCode::IllegalConfiguration);
/// assert_eq!(handle, PlanHandle::INVALID);
/// ```
#[derive(Debug)]
pub struct Library {
    memory: DeviceMemory,
    instances: HashMap<InstanceId, Manager>,
}

impl Library {
    pub fn new(config: &ManagerConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(Self::with_device(DeviceMemory::new(config.device.clone())?))
    }

    pub fn with_device(memory: DeviceMemory) -> Self {
        Self {
            memory,
            instances: HashMap::new(),
        }
    }

    /// Start a new instance on the shared device pool.
    pub fn create_instance(&mut self) -> InstanceId {
        let manager = Manager::with_device(self.memory.clone());
        let id = manager.instance_id();
        self.instances.insert(id, manager);
        id
    }

    /// End an instance, releasing every plan it still holds.
    pub fn destroy_instance(&mut self, instance: InstanceId) -> ResultCode {
        match self.instances.remove(&instance) {
            Some(manager) => {
                info!(instance = %instance, plans = manager.plan_count(), "Instance destroyed");
                ResultCode::Success
            }
            None => status(Err(PlanError::InvalidInstance { instance })),
        }
    }

    pub fn instance(&self, instance: InstanceId) -> PlanResult<&Manager> {
        self.instances
            .get(&instance)
            .ok_or(PlanError::InvalidInstance { instance })
    }

    pub fn instance_mut(&mut self, instance: InstanceId) -> PlanResult<&mut Manager> {
        self.instances
            .get_mut(&instance)
            .ok_or(PlanError::InvalidInstance { instance })
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Create a plan on `instance` from a numeric configuration.
    pub fn plan(
        &mut self,
        instance: InstanceId,
        config: RawConfiguration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
    ) -> (PlanHandle, ResultCode) {
        handle_status(self.instance_mut(instance).and_then(|manager| {
            let config = Configuration::try_from(config)?;
            manager.create_plan(config, num_elements, num_rows, row_pitch)
        }))
    }

    pub fn destroy_plan(&mut self, handle: PlanHandle) -> ResultCode {
        status(
            self.owning_instance(handle)
                .and_then(|manager| manager.destroy_plan(handle)),
        )
    }

    /// Create a sparse matrix-vector multiply plan on `instance`.
    #[allow(clippy::too_many_arguments)]
    pub fn sparse_matrix<T: Element>(
        &mut self,
        instance: InstanceId,
        config: RawConfiguration,
        num_non_zero: usize,
        num_rows: usize,
        values: &[T],
        row_indices: &[u32],
        indices: &[u32],
    ) -> (PlanHandle, ResultCode) {
        handle_status(self.instance_mut(instance).and_then(|manager| {
            let config = Configuration::try_from(config)?;
            manager.create_sparse_matrix_object(
                config,
                num_non_zero,
                num_rows,
                values,
                row_indices,
                indices,
            )
        }))
    }

    pub fn destroy_sparse_matrix(&mut self, handle: PlanHandle) -> ResultCode {
        status(
            self.owning_instance(handle)
                .and_then(|manager| manager.destroy_sparse_matrix_object(handle)),
        )
    }

    /// Statistics of the shared device pool.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    fn owning_instance(&mut self, handle: PlanHandle) -> PlanResult<&mut Manager> {
        self.instances
            .get_mut(&handle.instance())
            .ok_or(PlanError::InvalidHandle { handle })
    }
}

fn status(result: PlanResult<()>) -> ResultCode {
    match result {
        Ok(()) => ResultCode::Success,
        Err(e) => {
            warn!(error = %e, code = ?e.code(), "Library call failed");
            e.code()
        }
    }
}

fn handle_status(result: PlanResult<PlanHandle>) -> (PlanHandle, ResultCode) {
    match result {
        Ok(handle) => (handle, ResultCode::Success),
        Err(e) => (PlanHandle::INVALID, status(Err(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Algorithm, DataType, Operator, Options};

    fn raw(algorithm: Algorithm, options: Options) -> RawConfiguration {
        Configuration::new(algorithm, Operator::Add, DataType::UInt, options).into()
    }

    #[test]
    fn test_plan_on_unknown_instance() {
        let mut library = Library::new(&ManagerConfig::default()).unwrap();
        let (handle, code) = library.plan(
            InstanceId::INVALID,
            raw(Algorithm::Scan, Options::FORWARD),
            16,
            1,
            0,
        );
        assert_eq!(handle, PlanHandle::INVALID);
        assert_eq!(code, ResultCode::InvalidHandle);
    }

    #[test]
    fn test_unknown_algorithm_tag() {
        let mut library = Library::new(&ManagerConfig::default()).unwrap();
        let instance = library.create_instance();
        let config = RawConfiguration {
            algorithm: 99,
            ..Default::default()
        };
        let (_, code) = library.plan(instance, config, 16, 1, 0);
        assert_eq!(code, ResultCode::IllegalConfiguration);
    }

    #[test]
    fn test_destroy_instance_releases_plans() {
        let mut library = Library::new(&ManagerConfig::default()).unwrap();
        let instance = library.create_instance();
        let (handle, code) = library.plan(instance, raw(Algorithm::Compact, Options::NONE), 5000, 1, 0);
        assert!(code.is_success());
        assert!(library.memory_stats().total_allocated > 0);

        assert_eq!(library.destroy_instance(instance), ResultCode::Success);
        assert_eq!(library.memory_stats().total_allocated, 0);
        assert_eq!(library.destroy_plan(handle), ResultCode::InvalidHandle);
        assert_eq!(library.destroy_instance(instance), ResultCode::InvalidHandle);
    }
}
