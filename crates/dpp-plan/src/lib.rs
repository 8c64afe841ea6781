#![deny(deprecated)]

//! Plan management for data-parallel primitives.
//!
//! A plan captures everything an accelerated primitive (scan, segmented
//! scan, compaction, radix sort, reduction, sparse matrix-vector multiply,
//! random number generation) needs before it runs: the validated
//! configuration, the problem size and pre-allocated scratch storage. Some
//! plans are composed from others; compaction and radix sort own a scan,
//! and sparse matrix-vector multiply owns a segmented scan.
//!
//! Plans are created and destroyed through a [`Manager`] (one library
//! instance) and referred to by opaque [`PlanHandle`]s. [`Library`] offers
//! the same operations over numeric configurations with flat
//! [`ResultCode`]s.
//!
//! # Example
//!
//! ```
//! use dpp_plan::{
//!     Algorithm, CompactPlan, Configuration, DataType, Manager, ManagerConfig, Operator,
//!     Options,
//! };
//!
//! let mut manager = Manager::new(&ManagerConfig::default()).unwrap();
//! let config = Configuration::new(
//!     Algorithm::Compact,
//!     Operator::Add,
//!     DataType::Float,
//!     Options::FORWARD,
//! );
//!
//! let compact = manager.create_plan(config, 10_000, 1, 0).unwrap();
//! let scan = manager.resolve::<CompactPlan>(compact).unwrap().scan_plan();
//! assert_eq!(manager.plan(scan).unwrap().owner(), Some(compact));
//!
//! manager.destroy_plan(compact).unwrap();
//! assert_eq!(manager.plan_count(), 0);
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod handle;
pub mod library;
pub mod manager;
pub mod plan;
pub mod types;
pub mod validate;

pub use config::{DeviceConfig, LoggingConfig, ManagerConfig};
pub use device::{DeviceBuffer, DeviceMemory, MemoryStats};
pub use error::{PlanError, PlanResult, ResultCode};
pub use handle::{InstanceId, PlanHandle};
pub use library::Library;
pub use manager::Manager;
pub use plan::{
    AlgorithmPlan, CompactPlan, Plan, PlanInfo, PlanKind, RadixSortPlan, RandPlan, ReducePlan,
    ScanLayout, ScanPlan, SegmentedScanPlan, SparseMatrix, SparseMatrixVectorMultiplyPlan,
};
pub use types::{
    Algorithm, Configuration, DataType, Element, Operator, Options, RawConfiguration,
};
pub use validate::validate_options;
