//! Plan manager: one library instance and every plan it owns.
//!
//! The manager validates requests, builds plans transactionally, resolves
//! handles back to plans and tears plans down again. All plans draw scratch
//! storage from the manager's [`DeviceMemory`], which may be shared with
//! other managers on the same device.

use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::device::{DeviceMemory, MemoryStats};
use crate::error::{PlanError, PlanResult};
use crate::handle::{HandleTable, InstanceId, PlanHandle};
use crate::plan::{AlgorithmPlan, Plan, PlanBuilder, PlanInfo, RandPlan, SparseMatrix};
use crate::types::{Algorithm, Configuration, Element};
use crate::validate::validate_options;

/// One library instance.
///
/// # Example
///
/// ```
/// use dpp_plan::{Algorithm, Configuration, DataType, Manager, ManagerConfig, Operator, Options, ScanPlan};
///
/// let mut manager = Manager::new(&ManagerConfig::default()).unwrap();
/// let config = Configuration::new(
///     Algorithm::Scan,
///     Operator::Add,
///     DataType::Float,
///     Options::FORWARD | Options::EXCLUSIVE,
/// );
///
/// let handle = manager.create_plan(config, 1 << 20, 1, 0).unwrap();
/// assert_eq!(manager.resolve::<ScanPlan>(handle).unwrap().layout().num_levels(), 1);
///
/// manager.destroy_plan(handle).unwrap();
/// assert!(manager.plan(handle).is_err());
/// ```
#[derive(Debug)]
pub struct Manager {
    instance: InstanceId,
    memory: DeviceMemory,
    table: HandleTable,
}

impl Manager {
    /// Create a manager with its own device pool.
    ///
    /// # Errors
    ///
    /// Returns error if config validation fails.
    pub fn new(config: &ManagerConfig) -> PlanResult<Self> {
        config.validate()?;
        let memory = DeviceMemory::new(config.device.clone())?;
        Ok(Self::with_device(memory))
    }

    /// Create a manager on an existing (possibly shared) device pool.
    pub fn with_device(memory: DeviceMemory) -> Self {
        let instance = InstanceId::next();
        info!(
            instance = %instance,
            device_id = memory.device_id(),
            budget = memory.budget(),
            "Plan manager created"
        );
        Self {
            instance,
            table: HandleTable::new(instance),
            memory,
        }
    }

    #[inline]
    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    #[inline]
    pub fn device(&self) -> &DeviceMemory {
        &self.memory
    }

    /// Build a plan for `config` sized for up to `num_elements` elements.
    ///
    /// # Errors
    ///
    /// - `IllegalConfiguration` if the options conflict, Compact is asked
    ///   for several rows, or the algorithm is SparseMatrixVectorMultiply
    /// - `AllocationFailed` if the device pool cannot hold the scratch
    ///   storage
    ///
    /// Nothing stays allocated or registered when an error is returned.
    pub fn create_plan(
        &mut self,
        config: Configuration,
        num_elements: usize,
        num_rows: usize,
        row_pitch: usize,
    ) -> PlanResult<PlanHandle> {
        validate_options(&config, num_elements, num_rows, row_pitch)
            .map_err(|e| rejected(&config, e))?;

        let mut builder = PlanBuilder::new(&self.memory, &mut self.table);
        let handle = builder
            .build(None, config, num_elements, num_rows, row_pitch)
            .map_err(|e| rejected(&config, e))?;
        builder.commit();

        self.ensure_registered(handle)?;
        info!(
            handle = %handle,
            algorithm = config.algorithm.name(),
            num_elements,
            num_rows,
            "Plan created"
        );
        Ok(handle)
    }

    /// Build a sparse matrix-vector multiply plan from CSR data.
    ///
    /// `values` and `indices` hold `num_non_zero` entries, `row_indices`
    /// holds `num_rows` entries, and `T` must match `config.datatype`.
    pub fn create_sparse_matrix_object<T: Element>(
        &mut self,
        config: Configuration,
        num_non_zero: usize,
        num_rows: usize,
        values: &[T],
        row_indices: &[u32],
        indices: &[u32],
    ) -> PlanResult<PlanHandle> {
        let matrix = SparseMatrix::new(num_non_zero, num_rows, values, row_indices, indices);
        matrix
            .validate(&config)
            .and_then(|()| validate_options(&config, num_non_zero, num_rows, 0))
            .map_err(|e| rejected(&config, e))?;

        let mut builder = PlanBuilder::new(&self.memory, &mut self.table);
        let handle = builder
            .build_sparse_matrix(config, &matrix)
            .map_err(|e| rejected(&config, e))?;
        builder.commit();

        self.ensure_registered(handle)?;
        info!(
            handle = %handle,
            num_non_zero,
            num_rows,
            datatype = ?config.datatype,
            "Sparse matrix object created"
        );
        Ok(handle)
    }

    /// Destroy a plan and every plan nested inside it.
    ///
    /// # Errors
    ///
    /// - `InvalidHandle` if the handle is not registered with this instance
    /// - `OwnedByParent` if the handle belongs to a nested plan; destroy the
    ///   parent instead
    pub fn destroy_plan(&mut self, handle: PlanHandle) -> PlanResult<()> {
        let plan = self.table.get(handle)?;
        if let Some(owner) = plan.owner() {
            warn!(handle = %handle, owner = %owner, "Refusing to destroy nested plan");
            return Err(PlanError::OwnedByParent { handle, owner });
        }
        let algorithm = plan.algorithm();

        self.destroy_tree(handle)?;
        info!(handle = %handle, algorithm = algorithm.name(), "Plan destroyed");
        Ok(())
    }

    /// Destroy a plan created by [`Manager::create_sparse_matrix_object`].
    pub fn destroy_sparse_matrix_object(&mut self, handle: PlanHandle) -> PlanResult<()> {
        let plan = self.table.get(handle)?;
        if plan.algorithm() != Algorithm::SparseMatrixVectorMultiply {
            return Err(PlanError::KindMismatch {
                handle,
                expected: Algorithm::SparseMatrixVectorMultiply,
                actual: plan.algorithm(),
            });
        }
        self.destroy_plan(handle)
    }

    /// Free a plan's storage, then its nested plan, then its registration.
    fn destroy_tree(&mut self, handle: PlanHandle) -> PlanResult<()> {
        let plan = self.table.get_mut(handle)?;
        let scratch_bytes = plan.scratch_bytes();
        let nested = plan.release();

        if let Some(nested) = nested {
            self.destroy_tree(nested)?;
        }
        self.table.remove(handle);
        debug!(handle = %handle, scratch_bytes, ?nested, "Plan released");
        Ok(())
    }

    fn ensure_registered(&self, handle: PlanHandle) -> PlanResult<()> {
        if self.table.contains(handle) {
            Ok(())
        } else {
            Err(PlanError::Unknown(format!(
                "{} was built but is not registered",
                handle
            )))
        }
    }

    /// Look up any registered plan.
    pub fn plan(&self, handle: PlanHandle) -> PlanResult<&Plan> {
        self.table.get(handle)
    }

    /// Look up a plan as a concrete kind.
    ///
    /// # Errors
    ///
    /// - `InvalidHandle` if the handle is not registered with this instance
    /// - `KindMismatch` if the plan is of another algorithm
    pub fn resolve<P: AlgorithmPlan>(&self, handle: PlanHandle) -> PlanResult<&P> {
        let plan = self.table.get(handle)?;
        plan.downcast::<P>().ok_or(PlanError::KindMismatch {
            handle,
            expected: P::ALGORITHM,
            actual: plan.algorithm(),
        })
    }

    pub fn resolve_mut<P: AlgorithmPlan>(&mut self, handle: PlanHandle) -> PlanResult<&mut P> {
        let plan = self.table.get_mut(handle)?;
        let actual = plan.algorithm();
        plan.downcast_mut::<P>().ok_or(PlanError::KindMismatch {
            handle,
            expected: P::ALGORITHM,
            actual,
        })
    }

    /// Set the seed the next generator run on a rand plan starts from.
    pub fn set_rand_seed(&mut self, handle: PlanHandle, seed: u32) -> PlanResult<()> {
        self.resolve_mut::<RandPlan>(handle)?.set_seed(seed);
        debug!(handle = %handle, seed, "Rand seed set");
        Ok(())
    }

    pub fn plan_info(&self, handle: PlanHandle) -> PlanResult<PlanInfo> {
        self.table.get(handle).map(Plan::info)
    }

    /// Registered plans, nested plans included.
    pub fn plan_count(&self) -> usize {
        self.table.len()
    }

    pub fn handles(&self) -> Vec<PlanHandle> {
        self.table.handles().collect()
    }

    /// Statistics of the (possibly shared) device pool.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        info!(
            instance = %self.instance,
            remaining_plans = self.table.len(),
            "Plan manager dropped"
        );
    }
}

fn rejected(config: &Configuration, err: PlanError) -> PlanError {
    warn!(
        algorithm = config.algorithm.name(),
        options = ?config.options,
        error = %err,
        "Plan request rejected"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::plan::{CompactPlan, ScanPlan};
    use crate::types::{DataType, Operator, Options};

    fn manager() -> Manager {
        Manager::new(&ManagerConfig::default()).unwrap()
    }

    fn config(algorithm: Algorithm, options: Options) -> Configuration {
        Configuration::new(algorithm, Operator::Add, DataType::Float, options)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = ManagerConfig::default();
        config.device.alignment = 3;
        assert!(matches!(Manager::new(&config), Err(PlanError::Config(_))));
    }

    #[test]
    fn test_create_and_destroy_scan() {
        let mut manager = manager();
        let handle = manager
            .create_plan(config(Algorithm::Scan, Options::FORWARD), 4096, 1, 0)
            .unwrap();

        assert_eq!(manager.plan_count(), 1);
        assert_eq!(manager.plan(handle).unwrap().instance(), manager.instance_id());
        assert!(manager.memory_stats().total_allocated > 0);

        manager.destroy_plan(handle).unwrap();
        assert_eq!(manager.plan_count(), 0);
        assert_eq!(manager.memory_stats().total_allocated, 0);
    }

    #[test]
    fn test_resolve_wrong_kind() {
        let mut manager = manager();
        let handle = manager
            .create_plan(config(Algorithm::Scan, Options::NONE), 16, 1, 0)
            .unwrap();

        let err = manager.resolve::<CompactPlan>(handle).unwrap_err();
        assert!(matches!(
            err,
            PlanError::KindMismatch {
                expected: Algorithm::Compact,
                actual: Algorithm::Scan,
                ..
            }
        ));
        assert!(manager.resolve::<ScanPlan>(handle).is_ok());
    }

    #[test]
    fn test_nested_plan_cannot_be_destroyed_directly() {
        let mut manager = manager();
        let compact = manager
            .create_plan(config(Algorithm::Compact, Options::FORWARD), 1000, 1, 0)
            .unwrap();
        let scan = manager.resolve::<CompactPlan>(compact).unwrap().scan_plan();

        let err = manager.destroy_plan(scan).unwrap_err();
        assert!(matches!(err, PlanError::OwnedByParent { owner, .. } if owner == compact));
        assert_eq!(manager.plan_count(), 2);

        manager.destroy_plan(compact).unwrap();
        assert_eq!(manager.plan_count(), 0);
    }

    #[test]
    fn test_set_rand_seed() {
        let mut manager = manager();
        let handle = manager
            .create_plan(config(Algorithm::Rand, Options::NONE), 1024, 1, 0)
            .unwrap();

        manager.set_rand_seed(handle, 42).unwrap();
        assert_eq!(manager.resolve::<RandPlan>(handle).unwrap().seed(), 42);
    }

    #[test]
    fn test_set_rand_seed_on_other_kind() {
        let mut manager = manager();
        let handle = manager
            .create_plan(config(Algorithm::Reduce, Options::NONE), 1024, 1, 0)
            .unwrap();
        assert!(matches!(
            manager.set_rand_seed(handle, 1),
            Err(PlanError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_drop_returns_memory_to_shared_pool() {
        let memory = DeviceMemory::new(DeviceConfig::default()).unwrap();
        {
            let mut manager = Manager::with_device(memory.clone());
            manager
                .create_plan(config(Algorithm::RadixSort, Options::NONE), 1 << 16, 1, 0)
                .unwrap();
            assert!(memory.used() > 0);
        }
        assert_eq!(memory.used(), 0);
    }
}
