//! Configuration descriptor types.
//!
//! A [`Configuration`] names the algorithm, operator, datatype and option
//! bits of a request. [`RawConfiguration`] is the untagged numeric form used
//! by the handle-based surface; converting it is where unknown tags are
//! rejected.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Algorithms a plan can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Prefix sum.
    Scan,
    /// Prefix sum that restarts at segment heads.
    SegmentedScan,
    /// Stream compaction driven by a validity flag per element.
    Compact,
    /// Parallel reduction to one value.
    Reduce,
    /// Radix sort of keys or key/value pairs.
    RadixSort,
    /// Sparse matrix times dense vector.
    SparseMatrixVectorMultiply,
    /// Pseudo-random number generation.
    Rand,
}

impl Algorithm {
    /// All algorithms, in tag order.
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Scan,
        Algorithm::SegmentedScan,
        Algorithm::Compact,
        Algorithm::Reduce,
        Algorithm::RadixSort,
        Algorithm::SparseMatrixVectorMultiply,
        Algorithm::Rand,
    ];

    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            Algorithm::Scan => "scan",
            Algorithm::SegmentedScan => "segmented_scan",
            Algorithm::Compact => "compact",
            Algorithm::Reduce => "reduce",
            Algorithm::RadixSort => "radix_sort",
            Algorithm::SparseMatrixVectorMultiply => "spmv",
            Algorithm::Rand => "rand",
        }
    }
}

impl TryFrom<u32> for Algorithm {
    type Error = PlanError;

    fn try_from(tag: u32) -> PlanResult<Self> {
        Algorithm::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| PlanError::illegal(format!("unknown algorithm tag {}", tag)))
    }
}

/// Binary operator applied by scans and reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Multiply,
    Min,
    Max,
}

impl TryFrom<u32> for Operator {
    type Error = PlanError;

    fn try_from(tag: u32) -> PlanResult<Self> {
        match tag {
            0 => Ok(Operator::Add),
            1 => Ok(Operator::Multiply),
            2 => Ok(Operator::Min),
            3 => Ok(Operator::Max),
            _ => Err(PlanError::illegal(format!("unknown operator tag {}", tag))),
        }
    }
}

/// Element type of the data a plan processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Char,
    UChar,
    Int,
    UInt,
    Float,
    Double,
    LongLong,
    ULongLong,
}

impl DataType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size_bytes(&self) -> usize {
        match self {
            DataType::Char | DataType::UChar => 1,
            DataType::Int | DataType::UInt | DataType::Float => 4,
            DataType::Double | DataType::LongLong | DataType::ULongLong => 8,
        }
    }
}

impl TryFrom<u32> for DataType {
    type Error = PlanError;

    fn try_from(tag: u32) -> PlanResult<Self> {
        match tag {
            0 => Ok(DataType::Char),
            1 => Ok(DataType::UChar),
            2 => Ok(DataType::Int),
            3 => Ok(DataType::UInt),
            4 => Ok(DataType::Float),
            5 => Ok(DataType::Double),
            6 => Ok(DataType::LongLong),
            7 => Ok(DataType::ULongLong),
            _ => Err(PlanError::illegal(format!("unknown datatype tag {}", tag))),
        }
    }
}

/// Host element types that can be uploaded into plan storage.
pub trait Element: bytemuck::Pod {
    /// Datatype tag this element corresponds to.
    const DATATYPE: DataType;
}

impl Element for i8 {
    const DATATYPE: DataType = DataType::Char;
}
impl Element for u8 {
    const DATATYPE: DataType = DataType::UChar;
}
impl Element for i32 {
    const DATATYPE: DataType = DataType::Int;
}
impl Element for u32 {
    const DATATYPE: DataType = DataType::UInt;
}
impl Element for f32 {
    const DATATYPE: DataType = DataType::Float;
}
impl Element for f64 {
    const DATATYPE: DataType = DataType::Double;
}
impl Element for i64 {
    const DATATYPE: DataType = DataType::LongLong;
}
impl Element for u64 {
    const DATATYPE: DataType = DataType::ULongLong;
}

/// Option bitmask.
///
/// # Example
///
/// ```
/// use dpp_plan::Options;
///
/// let opts = Options::FORWARD | Options::EXCLUSIVE;
/// assert!(opts.contains(Options::FORWARD));
/// assert!(!opts.contains(Options::BACKWARD));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(u32);

impl Options {
    pub const NONE: Options = Options(0);
    pub const FORWARD: Options = Options(0x1);
    pub const BACKWARD: Options = Options(0x2);
    pub const EXCLUSIVE: Options = Options(0x4);
    pub const INCLUSIVE: Options = Options(0x8);
    /// Operate within one block only.
    pub const CTA_LOCAL: Options = Options(0x10);
    pub const KEYS_ONLY: Options = Options(0x20);
    pub const KEY_VALUE_PAIRS: Options = Options(0x40);

    const KNOWN_BITS: u32 = 0x7f;

    /// Build from raw bits, rejecting bits no option is assigned to.
    pub fn from_bits(bits: u32) -> PlanResult<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return Err(PlanError::illegal(format!(
                "unknown option bits {:#x}",
                bits & !Self::KNOWN_BITS
            )));
        }
        Ok(Options(bits))
    }

    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[inline]
    pub const fn contains(&self, other: Options) -> bool {
        self.0 & other.0 == other.0
    }

    /// `self | other`, usable in constants.
    #[inline]
    pub const fn union(self, other: Options) -> Options {
        Options(self.0 | other.0)
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        self.union(rhs)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Options) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Options, &str); 7] = [
            (Options::FORWARD, "FORWARD"),
            (Options::BACKWARD, "BACKWARD"),
            (Options::EXCLUSIVE, "EXCLUSIVE"),
            (Options::INCLUSIVE, "INCLUSIVE"),
            (Options::CTA_LOCAL, "CTA_LOCAL"),
            (Options::KEYS_ONLY, "KEYS_ONLY"),
            (Options::KEY_VALUE_PAIRS, "KEY_VALUE_PAIRS"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(opt, _)| self.contains(*opt))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "Options(NONE)")
        } else {
            write!(f, "Options({})", set.join(" | "))
        }
    }
}

/// Algorithm request descriptor.
///
/// # Example
///
/// ```
/// use dpp_plan::{Algorithm, Configuration, DataType, Operator, Options};
///
/// let config = Configuration::new(
///     Algorithm::Scan,
///     Operator::Add,
///     DataType::Float,
///     Options::FORWARD | Options::EXCLUSIVE,
/// );
/// assert_eq!(config.algorithm, Algorithm::Scan);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub algorithm: Algorithm,
    pub operator: Operator,
    pub datatype: DataType,
    pub options: Options,
}

impl Configuration {
    pub const fn new(
        algorithm: Algorithm,
        operator: Operator,
        datatype: DataType,
        options: Options,
    ) -> Self {
        Self {
            algorithm,
            operator,
            datatype,
            options,
        }
    }
}

/// Numeric form of a [`Configuration`], as passed through handle-based APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawConfiguration {
    pub algorithm: u32,
    pub operator: u32,
    pub datatype: u32,
    pub options: u32,
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = PlanError;

    fn try_from(raw: RawConfiguration) -> PlanResult<Self> {
        Ok(Configuration {
            algorithm: Algorithm::try_from(raw.algorithm)?,
            operator: Operator::try_from(raw.operator)?,
            datatype: DataType::try_from(raw.datatype)?,
            options: Options::from_bits(raw.options)?,
        })
    }
}

impl From<Configuration> for RawConfiguration {
    fn from(config: Configuration) -> Self {
        RawConfiguration {
            algorithm: config.algorithm as u32,
            operator: config.operator as u32,
            datatype: config.datatype as u32,
            options: config.options.bits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_sizes() {
        assert_eq!(DataType::Char.size_bytes(), 1);
        assert_eq!(DataType::UInt.size_bytes(), 4);
        assert_eq!(DataType::Float.size_bytes(), 4);
        assert_eq!(DataType::Double.size_bytes(), 8);
        assert_eq!(DataType::ULongLong.size_bytes(), 8);
    }

    #[test]
    fn test_raw_configuration_accepts_known_tags() {
        let raw = RawConfiguration {
            algorithm: 4,
            operator: 0,
            datatype: 3,
            options: 0x20,
        };
        let config = Configuration::try_from(raw).unwrap();
        assert_eq!(config.algorithm, Algorithm::RadixSort);
        assert_eq!(config.datatype, DataType::UInt);
        assert_eq!(config.options, Options::KEYS_ONLY);
        assert_eq!(RawConfiguration::from(config), raw);
    }

    #[test]
    fn test_raw_configuration_rejects_unknown_algorithm() {
        let raw = RawConfiguration {
            algorithm: 7,
            ..Default::default()
        };
        let err = Configuration::try_from(raw).unwrap_err();
        assert!(matches!(err, PlanError::IllegalConfiguration(_)));
        assert!(err.to_string().contains("algorithm tag 7"));
    }

    #[test]
    fn test_raw_configuration_rejects_unknown_option_bits() {
        let raw = RawConfiguration {
            options: 0x100 | 0x1,
            ..Default::default()
        };
        assert!(Configuration::try_from(raw).is_err());
    }

    #[test]
    fn test_options_debug_lists_flags() {
        let opts = Options::BACKWARD | Options::INCLUSIVE;
        assert_eq!(format!("{:?}", opts), "Options(BACKWARD | INCLUSIVE)");
        assert_eq!(format!("{:?}", Options::NONE), "Options(NONE)");
    }

    #[test]
    fn test_element_datatypes() {
        assert_eq!(<f32 as Element>::DATATYPE, DataType::Float);
        assert_eq!(<u32 as Element>::DATATYPE, DataType::UInt);
        assert_eq!(<i64 as Element>::DATATYPE, DataType::LongLong);
    }
}
