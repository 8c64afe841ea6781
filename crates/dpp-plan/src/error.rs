//! Error types for dpp-plan.
//!
//! [`PlanError`] is the structured error returned by every fallible
//! operation, and [`ResultCode`] is the flat status code reported through the
//! handle-based [`crate::library::Library`] surface.
//!
//! # Examples
//!
//! ```rust
//! use dpp_plan::{PlanError, PlanHandle, ResultCode};
//!
//! let err = PlanError::InvalidHandle { handle: PlanHandle::INVALID };
//! assert_eq!(err.code(), ResultCode::InvalidHandle);
//! assert!(err.to_string().contains("Invalid plan handle"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handle::{InstanceId, PlanHandle};
use crate::types::Algorithm;

/// Status code reported by the handle-based API.
///
/// Every [`PlanError`] maps onto exactly one code via [`PlanError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// The call completed and its outputs are valid.
    Success,
    /// Conflicting options, unsupported sizes, unknown tags or bad matrix
    /// arguments.
    IllegalConfiguration,
    /// The sentinel handle, or a handle that is not currently registered.
    InvalidHandle,
    /// The device pool could not satisfy a scratch allocation.
    AllocationFailed,
    /// A validated request produced no plan.
    Unknown,
}

impl ResultCode {
    /// Returns `true` for [`ResultCode::Success`].
    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

/// Top-level error type for plan management.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The request violates an option or sizing constraint.
    ///
    /// # When This Occurs
    ///
    /// - Forward and Backward (or Exclusive and Inclusive) both set
    /// - Compact requested with more than one row
    /// - Unknown algorithm, operator, datatype or option bits in a raw
    ///   configuration
    /// - Sparse matrix arguments that are empty or inconsistent
    #[error("Illegal configuration: {0}")]
    IllegalConfiguration(String),

    /// The handle is the invalid sentinel or is not registered.
    #[error("Invalid plan handle: {handle}")]
    InvalidHandle {
        /// The handle that failed to resolve
        handle: PlanHandle,
    },

    /// The instance id does not name a live instance.
    #[error("Invalid instance handle: {instance}")]
    InvalidInstance {
        /// The instance that failed to resolve
        instance: InstanceId,
    },

    /// A plan was resolved as the wrong algorithm kind.
    #[error("Plan {handle} is a {actual:?} plan, not {expected:?}")]
    KindMismatch {
        /// The handle that was resolved
        handle: PlanHandle,
        /// Algorithm the caller asked for
        expected: Algorithm,
        /// Algorithm recorded in the plan
        actual: Algorithm,
    },

    /// A nested plan can only be destroyed through its parent.
    #[error("Plan {handle} is owned by plan {owner} and cannot be destroyed directly")]
    OwnedByParent {
        /// The nested plan
        handle: PlanHandle,
        /// Its owning parent plan
        owner: PlanHandle,
    },

    /// The device pool cannot hold the requested buffer.
    #[error(
        "Device allocation of {requested} bytes for '{label}' failed: {used}/{budget} bytes in use"
    )]
    AllocationFailed {
        /// Which scratch buffer was being allocated
        label: &'static str,
        /// Requested size after alignment
        requested: usize,
        /// Bytes in use when the request was made
        used: usize,
        /// Total pool budget
        budget: usize,
    },

    /// Manager configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Should not occur in correct operation.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PlanError {
    /// Map this error onto the flat status code.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            PlanError::IllegalConfiguration(_)
            | PlanError::OwnedByParent { .. }
            | PlanError::Config(_) => ResultCode::IllegalConfiguration,
            PlanError::InvalidHandle { .. }
            | PlanError::InvalidInstance { .. }
            | PlanError::KindMismatch { .. } => ResultCode::InvalidHandle,
            PlanError::AllocationFailed { .. } => ResultCode::AllocationFailed,
            PlanError::Unknown(_) => ResultCode::Unknown,
        }
    }

    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        PlanError::IllegalConfiguration(msg.into())
    }
}

impl From<config::ConfigError> for PlanError {
    fn from(err: config::ConfigError) -> Self {
        PlanError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for PlanError {
    fn from(err: toml::de::Error) -> Self {
        PlanError::Config(format!("Failed to parse config file: {}", err))
    }
}

/// Result type alias for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_cover_taxonomy() {
        let handle = PlanHandle::INVALID;
        assert_eq!(
            PlanError::illegal("both directions").code(),
            ResultCode::IllegalConfiguration
        );
        assert_eq!(
            PlanError::InvalidHandle { handle }.code(),
            ResultCode::InvalidHandle
        );
        assert_eq!(
            PlanError::KindMismatch {
                handle,
                expected: Algorithm::Scan,
                actual: Algorithm::Compact,
            }
            .code(),
            ResultCode::InvalidHandle
        );
        assert_eq!(
            PlanError::OwnedByParent {
                handle,
                owner: handle,
            }
            .code(),
            ResultCode::IllegalConfiguration
        );
        assert_eq!(
            PlanError::Unknown("no plan".into()).code(),
            ResultCode::Unknown
        );
    }

    #[test]
    fn test_allocation_failed_display() {
        let err = PlanError::AllocationFailed {
            label: "scan.block_sums",
            requested: 4096,
            used: 1024,
            budget: 2048,
        };
        let msg = err.to_string();
        assert!(msg.contains("scan.block_sums"));
        assert!(msg.contains("4096"));
        assert_eq!(err.code(), ResultCode::AllocationFailed);
    }

    #[test]
    fn test_success_code() {
        assert!(ResultCode::Success.is_success());
        assert!(!ResultCode::Unknown.is_success());
    }
}
