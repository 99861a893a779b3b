//! avg(x)

use super::state::unexpected_state;
use super::{AggregateFunction, AggregationState, AverageState};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

pub const NAME: &str = "avg";

#[derive(Debug)]
pub struct AverageAggregation {
    info: FunctionInfo,
}

impl AverageAggregation {
    pub fn resolve(argument_types: &[DataType]) -> EngineResult<Self> {
        match argument_types {
            [t] if t.is_numeric_or_timestamp() => Ok(Self {
                info: FunctionInfo::new(
                    FunctionIdent::new(NAME, argument_types.to_vec()),
                    DataType::Double,
                    FunctionKind::Aggregate,
                ),
            }),
            _ => Err(EngineError::type_resolution(format!(
                "avg is not defined for {}",
                FunctionIdent::new(NAME, argument_types.to_vec())
            ))),
        }
    }
}

impl AggregateFunction for AverageAggregation {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn initial(&self) -> AggregationState {
        AggregationState::Average(AverageState::default())
    }

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()> {
        match state {
            AggregationState::Average(state) => {
                if let Some(v) = args.first().and_then(Value::as_f64) {
                    state.count += 1;
                    state.sum += v;
                }
                Ok(())
            }
            other => Err(unexpected_state(NAME, other)),
        }
    }

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState> {
        match (a, b) {
            (AggregationState::Average(a), AggregationState::Average(b)) => {
                Ok(AggregationState::Average(AverageState {
                    count: a.count + b.count,
                    sum: a.sum + b.sum,
                }))
            }
            (AggregationState::Average(_), other) | (other, _) => {
                Err(unexpected_state(NAME, &other))
            }
        }
    }

    fn finalize(&self, state: AggregationState) -> EngineResult<Value> {
        match state {
            AggregationState::Average(state) if state.count == 0 => Ok(Value::Null),
            AggregationState::Average(state) => Ok(Value::Double(state.sum / state.count as f64)),
            other => Err(unexpected_state(NAME, &other)),
        }
    }
}
