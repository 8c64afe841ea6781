//! Sparse matrix-vector multiply plans.
//!
//! The matrix is held in CSR form: nonzero values, their column indices and
//! the flattened start index of every row. The product `y = A * x` is
//! computed by multiplying every nonzero with its `x` entry and running an
//! inclusive segmented add over the products, one segment per row. The last
//! element of each segment, found through the row final-index table, is the
//! row's result.

use crate::device::{DeviceBuffer, DeviceMemory};
use crate::error::{PlanError, PlanResult};
use crate::handle::PlanHandle;
use crate::types::{Algorithm, Configuration, Element, Operator, Options};

use super::{impl_plan_kind, reserved_bytes, AlgorithmPlan, PlanBuilder};

/// Borrowed CSR matrix data.
///
/// `num_rows` is the dimension of `y`, `x` and `A`.
#[derive(Debug, Clone, Copy)]
pub struct SparseMatrix<'a, T> {
    num_non_zero: usize,
    num_rows: usize,
    values: &'a [T],
    row_indices: &'a [u32],
    indices: &'a [u32],
}

impl<'a, T: Element> SparseMatrix<'a, T> {
    pub fn new(
        num_non_zero: usize,
        num_rows: usize,
        values: &'a [T],
        row_indices: &'a [u32],
        indices: &'a [u32],
    ) -> Self {
        Self {
            num_non_zero,
            num_rows,
            values,
            row_indices,
            indices,
        }
    }

    pub fn num_non_zero(&self) -> usize {
        self.num_non_zero
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Check the matrix against the plan configuration it is built for.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::IllegalConfiguration`] if:
    /// - the algorithm is not SparseMatrixVectorMultiply
    /// - `num_non_zero` or `num_rows` is 0, or `num_non_zero` exceeds `u32`
    /// - a slice length disagrees with the declared sizes
    /// - `T` does not match the configured datatype
    pub fn validate(&self, config: &Configuration) -> PlanResult<()> {
        if config.algorithm != Algorithm::SparseMatrixVectorMultiply {
            return Err(PlanError::illegal(format!(
                "sparse matrix objects require the SparseMatrixVectorMultiply algorithm, got {}",
                config.algorithm.name()
            )));
        }
        if self.num_non_zero == 0 || self.num_rows == 0 {
            return Err(PlanError::illegal(format!(
                "sparse matrix needs at least one row and one nonzero, got {} rows and {} nonzeros",
                self.num_rows, self.num_non_zero
            )));
        }
        if u32::try_from(self.num_non_zero).is_err() {
            return Err(PlanError::illegal(format!(
                "{} nonzeros cannot be indexed with u32",
                self.num_non_zero
            )));
        }
        if self.values.len() != self.num_non_zero || self.indices.len() != self.num_non_zero {
            return Err(PlanError::illegal(format!(
                "expected {} values and column indices, got {} and {}",
                self.num_non_zero,
                self.values.len(),
                self.indices.len()
            )));
        }
        if self.row_indices.len() != self.num_rows {
            return Err(PlanError::illegal(format!(
                "expected {} row indices, got {}",
                self.num_rows,
                self.row_indices.len()
            )));
        }
        if T::DATATYPE != config.datatype {
            return Err(PlanError::illegal(format!(
                "matrix values are {:?} but the plan is configured for {:?}",
                T::DATATYPE,
                config.datatype
            )));
        }
        Ok(())
    }

    /// Index of the last-plus-one nonzero of every row.
    ///
    /// Entry `i` is the start of row `i + 1`; the final entry is the nonzero
    /// count.
    pub fn row_final_indices(&self) -> Vec<u32> {
        let last = self.num_non_zero as u32;
        self.row_indices
            .iter()
            .skip(1)
            .copied()
            .chain(std::iter::once(last))
            .collect()
    }

    /// Segment head flags: 1 at the first nonzero of every row.
    ///
    /// Row starts at or past the nonzero count (empty trailing rows) set no
    /// flag.
    pub fn segment_flags(&self) -> Vec<u32> {
        let mut flags = vec![0u32; self.num_non_zero];
        for &start in self.row_indices {
            if let Some(flag) = flags.get_mut(start as usize) {
                *flag = 1;
            }
        }
        flags
    }
}

#[derive(Debug)]
pub struct SparseMatrixVectorMultiplyStorage {
    values: DeviceBuffer,
    products: DeviceBuffer,
    flags: DeviceBuffer,
    indices: DeviceBuffer,
    row_indices: DeviceBuffer,
    row_final_indices: DeviceBuffer,
}

impl SparseMatrixVectorMultiplyStorage {
    /// Nonzero values.
    pub fn values(&self) -> &DeviceBuffer {
        &self.values
    }

    /// Per-nonzero products, the input of the segmented scan.
    pub fn products(&self) -> &DeviceBuffer {
        &self.products
    }

    pub fn flags(&self) -> &DeviceBuffer {
        &self.flags
    }

    /// Column index of every nonzero.
    pub fn indices(&self) -> &DeviceBuffer {
        &self.indices
    }

    pub fn row_indices(&self) -> &DeviceBuffer {
        &self.row_indices
    }

    pub fn row_final_indices(&self) -> &DeviceBuffer {
        &self.row_final_indices
    }

    fn buffers(&self) -> [&DeviceBuffer; 6] {
        [
            &self.values,
            &self.products,
            &self.flags,
            &self.indices,
            &self.row_indices,
            &self.row_final_indices,
        ]
    }
}

#[derive(Debug)]
pub struct SparseMatrixVectorMultiplyPlan {
    segmented_scan_plan: PlanHandle,
    row_final_indices: Vec<u32>,
    storage: Option<SparseMatrixVectorMultiplyStorage>,
}

impl SparseMatrixVectorMultiplyPlan {
    /// Configuration of the nested segmented scan for `config`.
    pub fn segmented_scan_config(config: &Configuration) -> Configuration {
        Configuration::new(
            Algorithm::SegmentedScan,
            Operator::Add,
            config.datatype,
            Options::FORWARD | Options::INCLUSIVE,
        )
    }

    pub(crate) fn build<T: Element>(
        builder: &mut PlanBuilder<'_>,
        handle: PlanHandle,
        config: &Configuration,
        matrix: &SparseMatrix<'_, T>,
    ) -> PlanResult<Self> {
        let nnz = matrix.num_non_zero;
        let segmented_scan_plan = builder.build(
            Some(handle),
            Self::segmented_scan_config(config),
            nnz,
            1,
            0,
        )?;

        let row_final_indices = matrix.row_final_indices();
        let storage = Self::upload(builder.memory(), config, matrix, &row_final_indices)?;

        Ok(Self {
            segmented_scan_plan,
            row_final_indices,
            storage: Some(storage),
        })
    }

    fn upload<T: Element>(
        memory: &DeviceMemory,
        config: &Configuration,
        matrix: &SparseMatrix<'_, T>,
        row_final_indices: &[u32],
    ) -> PlanResult<SparseMatrixVectorMultiplyStorage> {
        let nnz = matrix.num_non_zero;
        let rows = matrix.num_rows;
        let elem_size = config.datatype.size_bytes();

        let mut values = memory.allocate_elements(nnz, elem_size, "spmv.values")?;
        let products = memory.allocate_elements(nnz, elem_size, "spmv.products")?;
        let mut flags = memory.allocate_elements(nnz, 4, "spmv.flags")?;
        let mut indices = memory.allocate_elements(nnz, 4, "spmv.indices")?;
        let mut row_indices = memory.allocate_elements(rows, 4, "spmv.row_indices")?;
        let mut row_final = memory.allocate_elements(rows, 4, "spmv.row_final_indices")?;

        values.copy_from_host(matrix.values)?;
        flags.copy_from_host(&matrix.segment_flags())?;
        indices.copy_from_host(matrix.indices)?;
        row_indices.copy_from_host(matrix.row_indices)?;
        row_final.copy_from_host(row_final_indices)?;

        Ok(SparseMatrixVectorMultiplyStorage {
            values,
            products,
            flags,
            indices,
            row_indices,
            row_final_indices: row_final,
        })
    }

    pub fn segmented_scan_plan(&self) -> PlanHandle {
        self.segmented_scan_plan
    }

    /// Host copy of the row final-index table, `num_rows` entries.
    pub fn row_final_indices(&self) -> &[u32] {
        &self.row_final_indices
    }

    pub fn storage(&self) -> Option<&SparseMatrixVectorMultiplyStorage> {
        self.storage.as_ref()
    }
}

impl AlgorithmPlan for SparseMatrixVectorMultiplyPlan {
    const ALGORITHM: Algorithm = Algorithm::SparseMatrixVectorMultiply;

    impl_plan_kind!(SparseMatrixVectorMultiply);

    fn nested_plan(&self) -> Option<PlanHandle> {
        Some(self.segmented_scan_plan)
    }

    fn scratch_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| reserved_bytes(s.buffers()))
    }

    fn release(&mut self) -> Option<PlanHandle> {
        self.storage.take().map(|_| self.segmented_scan_plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    const VALUES: [f32; 12] = [1.0; 12];
    const INDICES: [u32; 12] = [0, 1, 2, 0, 0, 1, 2, 0, 1, 0, 1, 2];
    const ROW_INDICES: [u32; 3] = [0, 4, 9];

    fn spmv_config(datatype: DataType) -> Configuration {
        Configuration::new(
            Algorithm::SparseMatrixVectorMultiply,
            Operator::Add,
            datatype,
            Options::NONE,
        )
    }

    #[test]
    fn test_row_final_indices() {
        let matrix = SparseMatrix::new(12, 3, &VALUES, &ROW_INDICES, &INDICES);
        assert_eq!(matrix.row_final_indices(), vec![4, 9, 12]);

        let single = SparseMatrix::new(12, 1, &VALUES, &[0], &INDICES);
        assert_eq!(single.row_final_indices(), vec![12]);
    }

    #[test]
    fn test_segment_flags_mark_row_starts() {
        let matrix = SparseMatrix::new(12, 3, &VALUES, &ROW_INDICES, &INDICES);
        let flags = matrix.segment_flags();
        assert_eq!(flags.len(), 12);
        assert_eq!(flags.iter().sum::<u32>(), 3);
        assert_eq!((flags[0], flags[4], flags[9]), (1, 1, 1));

        let trailing_empty = SparseMatrix::new(12, 4, &VALUES, &[0, 4, 9, 12], &INDICES);
        assert_eq!(trailing_empty.segment_flags().iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_validate_accepts_matching_matrix() {
        let matrix = SparseMatrix::new(12, 3, &VALUES, &ROW_INDICES, &INDICES);
        assert!(matrix.validate(&spmv_config(DataType::Float)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_matrices() {
        let config = spmv_config(DataType::Float);

        let wrong_type = SparseMatrix::new(12, 3, &VALUES, &ROW_INDICES, &INDICES);
        assert!(wrong_type.validate(&spmv_config(DataType::Double)).is_err());

        let short_values = SparseMatrix::new(12, 3, &VALUES[..11], &ROW_INDICES, &INDICES);
        assert!(short_values.validate(&config).is_err());

        let short_rows = SparseMatrix::new(12, 3, &VALUES, &ROW_INDICES[..2], &INDICES);
        assert!(short_rows.validate(&config).is_err());

        let empty = SparseMatrix::<f32>::new(0, 0, &[], &[], &[]);
        assert!(matches!(
            empty.validate(&config),
            Err(PlanError::IllegalConfiguration(_))
        ));

        let scan = Configuration::new(Algorithm::Scan, Operator::Add, DataType::Float, Options::NONE);
        assert!(wrong_type.validate(&scan).is_err());
    }

    #[test]
    fn test_segmented_scan_config() {
        let nested = SparseMatrixVectorMultiplyPlan::segmented_scan_config(&spmv_config(
            DataType::Double,
        ));
        assert_eq!(nested.algorithm, Algorithm::SegmentedScan);
        assert_eq!(nested.operator, Operator::Add);
        assert_eq!(nested.datatype, DataType::Double);
        assert_eq!(nested.options, Options::FORWARD | Options::INCLUSIVE);
    }
}
