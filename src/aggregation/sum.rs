//! sum(x)

use super::state::unexpected_state;
use super::{AggregateFunction, AggregationState, SumState};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

pub const NAME: &str = "sum";

/// Sums integral inputs into a Long and floating inputs into a Double
#[derive(Debug)]
pub struct SumAggregation {
    info: FunctionInfo,
}

impl SumAggregation {
    pub fn resolve(argument_types: &[DataType]) -> EngineResult<Self> {
        let return_type = match argument_types {
            [t] if t.is_integral() => DataType::Long,
            [DataType::Float | DataType::Double] => DataType::Double,
            _ => {
                return Err(EngineError::type_resolution(format!(
                    "sum is not defined for {}",
                    FunctionIdent::new(NAME, argument_types.to_vec())
                )))
            }
        };
        Ok(Self {
            info: FunctionInfo::new(
                FunctionIdent::new(NAME, argument_types.to_vec()),
                return_type,
                FunctionKind::Aggregate,
            ),
        })
    }
}

fn add_long(a: i64, b: i64) -> EngineResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| EngineError::execution("long overflow in sum"))
}

fn combine<T, F>(a: Option<T>, b: Option<T>, add: F) -> EngineResult<Option<T>>
where
    F: FnOnce(T, T) -> EngineResult<T>,
{
    match (a, b) {
        (Some(a), Some(b)) => add(a, b).map(Some),
        (a, None) => Ok(a),
        (None, b) => Ok(b),
    }
}

impl AggregateFunction for SumAggregation {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn initial(&self) -> AggregationState {
        if self.info.return_type == DataType::Long {
            AggregationState::Sum(SumState::Long(None))
        } else {
            AggregationState::Sum(SumState::Double(None))
        }
    }

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()> {
        let value = match args.first() {
            Some(value) if !value.is_null() => value,
            _ => return Ok(()),
        };
        match state {
            AggregationState::Sum(SumState::Long(sum)) => {
                let v = value.as_i64().ok_or_else(|| {
                    EngineError::execution(format!("sum expected an integral value, got {value}"))
                })?;
                *sum = Some(add_long(sum.unwrap_or(0), v)?);
            }
            AggregationState::Sum(SumState::Double(sum)) => {
                let v = value.as_f64().ok_or_else(|| {
                    EngineError::execution(format!("sum expected a numeric value, got {value}"))
                })?;
                *sum = Some(sum.unwrap_or(0.0) + v);
            }
            other => return Err(unexpected_state(NAME, other)),
        }
        Ok(())
    }

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState> {
        let merged = match (a, b) {
            (AggregationState::Sum(SumState::Long(a)), AggregationState::Sum(SumState::Long(b))) => {
                SumState::Long(combine(a, b, add_long)?)
            }
            (
                AggregationState::Sum(SumState::Double(a)),
                AggregationState::Sum(SumState::Double(b)),
            ) => SumState::Double(combine(a, b, |a, b| Ok(a + b))?),
            (AggregationState::Sum(_), AggregationState::Sum(_)) => {
                return Err(EngineError::merge("cannot merge long and double sums"))
            }
            (AggregationState::Sum(_), other) | (other, _) => {
                return Err(unexpected_state(NAME, &other))
            }
        };
        Ok(AggregationState::Sum(merged))
    }

    fn finalize(&self, state: AggregationState) -> EngineResult<Value> {
        match state {
            AggregationState::Sum(SumState::Long(sum)) => Ok(Value::from(sum)),
            AggregationState::Sum(SumState::Double(sum)) => Ok(Value::from(sum)),
            other => Err(unexpected_state(NAME, &other)),
        }
    }
}
