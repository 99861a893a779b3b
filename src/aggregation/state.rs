//! Partial aggregation states and their wire form

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::types::{DataType, Value};

const COUNT_TAG: u8 = 0;
const SUM_TAG: u8 = 1;
const AVERAGE_TAG: u8 = 2;
const EXTREME_TAG: u8 = 3;
const VARIANCE_TAG: u8 = 4;

/// Partial state of one aggregate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationState {
    Count(CountState),
    Sum(SumState),
    Average(AverageState),
    Extreme(ExtremeState),
    Variance(VarianceState),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountState {
    pub count: u64,
}

/// Running sum; `None` until the first non-null input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SumState {
    Long(Option<i64>),
    Double(Option<f64>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageState {
    pub count: u64,
    pub sum: f64,
}

/// Current minimum or maximum; null until the first non-null input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeState {
    pub is_max: bool,
    pub value: Value,
}

/// Welford accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VarianceState {
    pub count: u64,
    pub mean: f64,
    pub m2: f64,
}

impl AggregationState {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AggregationState::Count(_) => "count",
            AggregationState::Sum(_) => "sum",
            AggregationState::Average(_) => "avg",
            AggregationState::Extreme(state) if state.is_max => "max",
            AggregationState::Extreme(_) => "min",
            AggregationState::Variance(_) => "variance",
        }
    }

    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        match self {
            AggregationState::Count(state) => {
                out.write_u8(COUNT_TAG);
                out.write_vlong(state.count);
            }
            AggregationState::Sum(SumState::Long(sum)) => {
                out.write_u8(SUM_TAG);
                out.write_u8(0);
                out.write_bool(sum.is_some());
                if let Some(sum) = sum {
                    out.write_zlong(*sum);
                }
            }
            AggregationState::Sum(SumState::Double(sum)) => {
                out.write_u8(SUM_TAG);
                out.write_u8(1);
                out.write_bool(sum.is_some());
                if let Some(sum) = sum {
                    out.write_f64(*sum);
                }
            }
            AggregationState::Average(state) => {
                out.write_u8(AVERAGE_TAG);
                out.write_vlong(state.count);
                out.write_f64(state.sum);
            }
            AggregationState::Extreme(state) => {
                out.write_u8(EXTREME_TAG);
                out.write_bool(state.is_max);
                let data_type = state.value.data_type();
                data_type.write_to(out);
                data_type.streamer().write(&state.value, out)?;
            }
            AggregationState::Variance(state) => {
                out.write_u8(VARIANCE_TAG);
                out.write_vlong(state.count);
                out.write_f64(state.mean);
                out.write_f64(state.m2);
            }
        }
        Ok(())
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let state = match input.read_u8()? {
            COUNT_TAG => AggregationState::Count(CountState {
                count: input.read_vlong()?,
            }),
            SUM_TAG => {
                let is_double = input.read_bool()?;
                let present = input.read_bool()?;
                AggregationState::Sum(match (is_double, present) {
                    (false, true) => SumState::Long(Some(input.read_zlong()?)),
                    (false, false) => SumState::Long(None),
                    (true, true) => SumState::Double(Some(input.read_f64()?)),
                    (true, false) => SumState::Double(None),
                })
            }
            AVERAGE_TAG => AggregationState::Average(AverageState {
                count: input.read_vlong()?,
                sum: input.read_f64()?,
            }),
            EXTREME_TAG => {
                let is_max = input.read_bool()?;
                let data_type = DataType::read_from(input)?;
                if data_type == DataType::AggregationState {
                    return Err(EngineError::serialization(
                        "min/max state cannot hold a nested state",
                    ));
                }
                let value = data_type.streamer().read(input)?;
                AggregationState::Extreme(ExtremeState { is_max, value })
            }
            VARIANCE_TAG => AggregationState::Variance(VarianceState {
                count: input.read_vlong()?,
                mean: input.read_f64()?,
                m2: input.read_f64()?,
            }),
            tag => {
                return Err(EngineError::serialization(format!(
                    "unknown aggregation state tag {tag}"
                )))
            }
        };
        Ok(state)
    }
}

/// Error for a state of the wrong kind handed to an aggregate
pub(crate) fn unexpected_state(expected: &str, actual: &AggregationState) -> EngineError {
    EngineError::merge(format!(
        "expected a {} state, got a {} state",
        expected,
        actual.kind_name()
    ))
}
