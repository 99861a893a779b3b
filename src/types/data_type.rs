//! Logical data types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::streamer::{streamer_for, Streamer};
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};

/// Closed set of logical column types.
///
/// The discriminant is the wire id and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    /// Type of an untyped NULL literal
    Undefined = 0,
    Boolean = 1,
    Byte = 2,
    Short = 3,
    Integer = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    String = 8,
    /// Milliseconds since the Unix epoch
    Timestamp = 9,
    /// Partial aggregate state exchanged between aggregation steps
    AggregationState = 10,
}

impl DataType {
    /// Numeric types a numeric aggregate accepts
    pub const NUMERIC_PRIMITIVE_TYPES: [DataType; 6] = [
        DataType::Byte,
        DataType::Short,
        DataType::Integer,
        DataType::Long,
        DataType::Float,
        DataType::Double,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(DataType::Undefined),
            1 => Some(DataType::Boolean),
            2 => Some(DataType::Byte),
            3 => Some(DataType::Short),
            4 => Some(DataType::Integer),
            5 => Some(DataType::Long),
            6 => Some(DataType::Float),
            7 => Some(DataType::Double),
            8 => Some(DataType::String),
            9 => Some(DataType::Timestamp),
            10 => Some(DataType::AggregationState),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Undefined => "undefined",
            DataType::Boolean => "boolean",
            DataType::Byte => "byte",
            DataType::Short => "short",
            DataType::Integer => "integer",
            DataType::Long => "long",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Timestamp => "timestamp",
            DataType::AggregationState => "aggregation_state",
        }
    }

    pub fn is_numeric(self) -> bool {
        Self::NUMERIC_PRIMITIVE_TYPES.contains(&self)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Short | DataType::Integer | DataType::Long
        )
    }

    /// Numeric or timestamp, i.e. losslessly meaningful as a double
    pub fn is_numeric_or_timestamp(self) -> bool {
        self.is_numeric() || self == DataType::Timestamp
    }

    /// Whether values of this type have a total order usable by ORDER BY, MIN and MAX
    pub fn is_comparable(self) -> bool {
        !matches!(self, DataType::AggregationState)
    }

    /// The singleton streamer for this type
    pub fn streamer(self) -> &'static dyn Streamer {
        streamer_for(self)
    }

    pub fn write_to(self, out: &mut StreamOutput) {
        out.write_u8(self.id());
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let id = input.read_u8()?;
        Self::from_id(id)
            .ok_or_else(|| EngineError::serialization(format!("unknown data type id {id}")))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
