//! Per-type value streamers
//!
//! A streamer writes a null-flag byte (0 = null, 1 = present) followed by
//! the type-specific body. The bucket codec carries nulls in a per-row
//! bitmap instead and calls the flag-less `write_value` / `read_value`.

use std::fmt;

use super::{DataType, Value};
use crate::aggregation::AggregationState;
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};

/// Serialization strategy for the values of one [`DataType`]
pub trait Streamer: Send + Sync + fmt::Debug {
    /// The type this streamer encodes
    fn data_type(&self) -> DataType;

    /// Writes a non-null value without the null flag
    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()>;

    /// Reads a non-null value written by `write_value`
    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value>;

    /// Writes the null flag followed by the value body
    fn write(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        if value.is_null() {
            out.write_bool(false);
            Ok(())
        } else {
            out.write_bool(true);
            self.write_value(value, out)
        }
    }

    /// Reads a value written by `write`
    fn read(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        if input.read_bool()? {
            self.read_value(input)
        } else {
            Ok(Value::Null)
        }
    }
}

fn mismatch(streamer: DataType, value: &Value) -> EngineError {
    EngineError::serialization(format!(
        "{} streamer cannot write a {} value",
        streamer,
        value.data_type()
    ))
}

#[derive(Debug)]
struct UndefinedStreamer;

impl Streamer for UndefinedStreamer {
    fn data_type(&self) -> DataType {
        DataType::Undefined
    }

    fn write_value(&self, value: &Value, _out: &mut StreamOutput) -> EngineResult<()> {
        Err(mismatch(DataType::Undefined, value))
    }

    fn read_value(&self, _input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Err(EngineError::serialization(
            "undefined column carries a non-null value",
        ))
    }
}

#[derive(Debug)]
struct BooleanStreamer;

impl Streamer for BooleanStreamer {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Boolean(v) => {
                out.write_bool(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Boolean, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Boolean(input.read_bool()?))
    }
}

#[derive(Debug)]
struct ByteStreamer;

impl Streamer for ByteStreamer {
    fn data_type(&self) -> DataType {
        DataType::Byte
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Byte(v) => {
                out.write_u8(*v as u8);
                Ok(())
            }
            other => Err(mismatch(DataType::Byte, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Byte(input.read_u8()? as i8))
    }
}

#[derive(Debug)]
struct ShortStreamer;

impl Streamer for ShortStreamer {
    fn data_type(&self) -> DataType {
        DataType::Short
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Short(v) => {
                out.write_zint(i32::from(*v));
                Ok(())
            }
            other => Err(mismatch(DataType::Short, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        let raw = input.read_zint()?;
        i16::try_from(raw)
            .map(Value::Short)
            .map_err(|_| EngineError::serialization(format!("short value {raw} out of range")))
    }
}

#[derive(Debug)]
struct IntegerStreamer;

impl Streamer for IntegerStreamer {
    fn data_type(&self) -> DataType {
        DataType::Integer
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Integer(v) => {
                out.write_zint(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Integer, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Integer(input.read_zint()?))
    }
}

#[derive(Debug)]
struct LongStreamer;

impl Streamer for LongStreamer {
    fn data_type(&self) -> DataType {
        DataType::Long
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Long(v) => {
                out.write_zlong(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Long, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Long(input.read_zlong()?))
    }
}

#[derive(Debug)]
struct FloatStreamer;

impl Streamer for FloatStreamer {
    fn data_type(&self) -> DataType {
        DataType::Float
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Float(v) => {
                out.write_f32(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Float, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Float(input.read_f32()?))
    }
}

#[derive(Debug)]
struct DoubleStreamer;

impl Streamer for DoubleStreamer {
    fn data_type(&self) -> DataType {
        DataType::Double
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Double(v) => {
                out.write_f64(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Double, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Double(input.read_f64()?))
    }
}

#[derive(Debug)]
struct StringStreamer;

impl Streamer for StringStreamer {
    fn data_type(&self) -> DataType {
        DataType::String
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::String(v) => {
                out.write_string(v);
                Ok(())
            }
            other => Err(mismatch(DataType::String, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::String(input.read_string()?))
    }
}

#[derive(Debug)]
struct TimestampStreamer;

impl Streamer for TimestampStreamer {
    fn data_type(&self) -> DataType {
        DataType::Timestamp
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::Timestamp(v) => {
                out.write_zlong(*v);
                Ok(())
            }
            other => Err(mismatch(DataType::Timestamp, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::Timestamp(input.read_zlong()?))
    }
}

#[derive(Debug)]
struct AggregationStateStreamer;

impl Streamer for AggregationStateStreamer {
    fn data_type(&self) -> DataType {
        DataType::AggregationState
    }

    fn write_value(&self, value: &Value, out: &mut StreamOutput) -> EngineResult<()> {
        match value {
            Value::State(state) => state.write_to(out),
            other => Err(mismatch(DataType::AggregationState, other)),
        }
    }

    fn read_value(&self, input: &mut StreamInput<'_>) -> EngineResult<Value> {
        Ok(Value::State(Box::new(AggregationState::read_from(input)?)))
    }
}

static UNDEFINED: UndefinedStreamer = UndefinedStreamer;
static BOOLEAN: BooleanStreamer = BooleanStreamer;
static BYTE: ByteStreamer = ByteStreamer;
static SHORT: ShortStreamer = ShortStreamer;
static INTEGER: IntegerStreamer = IntegerStreamer;
static LONG: LongStreamer = LongStreamer;
static FLOAT: FloatStreamer = FloatStreamer;
static DOUBLE: DoubleStreamer = DoubleStreamer;
static STRING: StringStreamer = StringStreamer;
static TIMESTAMP: TimestampStreamer = TimestampStreamer;
static AGGREGATION_STATE: AggregationStateStreamer = AggregationStateStreamer;

/// Returns the singleton streamer for a data type
pub fn streamer_for(data_type: DataType) -> &'static dyn Streamer {
    match data_type {
        DataType::Undefined => &UNDEFINED,
        DataType::Boolean => &BOOLEAN,
        DataType::Byte => &BYTE,
        DataType::Short => &SHORT,
        DataType::Integer => &INTEGER,
        DataType::Long => &LONG,
        DataType::Float => &FLOAT,
        DataType::Double => &DOUBLE,
        DataType::String => &STRING,
        DataType::Timestamp => &TIMESTAMP,
        DataType::AggregationState => &AGGREGATION_STATE,
    }
}

/// Streamers for a row shape, in column order
pub fn streamers_for(types: &[DataType]) -> Vec<&'static dyn Streamer> {
    types.iter().map(|t| streamer_for(*t)).collect()
}
