//! Request validation.
//!
//! [`validate_options`] is pure and runs before any storage is touched, so a
//! rejected request never has side effects.

use crate::error::{PlanError, PlanResult};
use crate::types::{Algorithm, Configuration, Options};

/// Check option legality and per-algorithm size constraints.
///
/// # Errors
///
/// Returns [`PlanError::IllegalConfiguration`] if:
/// - Forward and Backward are both set
/// - Exclusive and Inclusive are both set
/// - The algorithm is Compact and `num_rows != 1`
///
/// # Example
///
/// ```
/// use dpp_plan::{validate_options, Algorithm, Configuration, DataType, Operator, Options};
///
/// let ok = Configuration::new(Algorithm::Scan, Operator::Add, DataType::Int, Options::FORWARD);
/// assert!(validate_options(&ok, 1024, 1, 0).is_ok());
///
/// let bad = Configuration::new(
///     Algorithm::Scan,
///     Operator::Add,
///     DataType::Int,
///     Options::FORWARD | Options::BACKWARD,
/// );
/// assert!(validate_options(&bad, 1024, 1, 0).is_err());
/// ```
pub fn validate_options(
    config: &Configuration,
    _num_elements: usize,
    num_rows: usize,
    _row_pitch: usize,
) -> PlanResult<()> {
    let options = config.options;
    if options.contains(Options::FORWARD) && options.contains(Options::BACKWARD) {
        return Err(PlanError::illegal(
            "Forward and Backward options are mutually exclusive",
        ));
    }
    if options.contains(Options::EXCLUSIVE) && options.contains(Options::INCLUSIVE) {
        return Err(PlanError::illegal(
            "Exclusive and Inclusive options are mutually exclusive",
        ));
    }
    // TODO: lift once compaction supports multi-row inputs
    if config.algorithm == Algorithm::Compact && num_rows != 1 {
        return Err(PlanError::illegal(format!(
            "Compact requires exactly one row, got {} rows",
            num_rows
        )));
    }
    Ok(())
}
