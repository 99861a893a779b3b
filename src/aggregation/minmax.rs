//! min(x) and max(x)

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::state::unexpected_state;
use super::{AggregateFunction, AggregationState, ExtremeState};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremeKind {
    Min,
    Max,
}

impl ExtremeKind {
    pub fn name(self) -> &'static str {
        match self {
            ExtremeKind::Min => "min",
            ExtremeKind::Max => "max",
        }
    }

    fn is_max(self) -> bool {
        self == ExtremeKind::Max
    }

    /// Whether `candidate` should replace `current`
    fn prefers(self, candidate: &Value, current: &Value) -> EngineResult<bool> {
        if current.is_null() {
            return Ok(true);
        }
        let ordering = candidate.compare(current).ok_or_else(|| {
            EngineError::execution(format!(
                "{} cannot compare {} with {}",
                self.name(),
                candidate.data_type(),
                current.data_type()
            ))
        })?;
        Ok(match self {
            ExtremeKind::Min => ordering == Ordering::Less,
            ExtremeKind::Max => ordering == Ordering::Greater,
        })
    }
}

/// Keeps the smallest or largest non-null value, typed like its argument
#[derive(Debug)]
pub struct ExtremeAggregation {
    info: FunctionInfo,
    kind: ExtremeKind,
}

impl ExtremeAggregation {
    pub fn resolve(kind: ExtremeKind, argument_types: &[DataType]) -> EngineResult<Self> {
        match argument_types {
            [t] if t.is_comparable() && *t != DataType::Undefined => Ok(Self {
                info: FunctionInfo::new(
                    FunctionIdent::new(kind.name(), argument_types.to_vec()),
                    *t,
                    FunctionKind::Aggregate,
                ),
                kind,
            }),
            _ => Err(EngineError::type_resolution(format!(
                "{} is not defined for {}",
                kind.name(),
                FunctionIdent::new(kind.name(), argument_types.to_vec())
            ))),
        }
    }

    fn accept(&self, state: &mut ExtremeState, candidate: Value) -> EngineResult<()> {
        if state.is_max != self.kind.is_max() {
            return Err(EngineError::merge("cannot combine min and max states"));
        }
        if !candidate.is_null() && self.kind.prefers(&candidate, &state.value)? {
            state.value = candidate;
        }
        Ok(())
    }
}

impl AggregateFunction for ExtremeAggregation {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn initial(&self) -> AggregationState {
        AggregationState::Extreme(ExtremeState {
            is_max: self.kind.is_max(),
            value: Value::Null,
        })
    }

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()> {
        match state {
            AggregationState::Extreme(state) => match args.first() {
                Some(value) => self.accept(state, value.clone()),
                None => Ok(()),
            },
            other => Err(unexpected_state(self.kind.name(), other)),
        }
    }

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState> {
        match (a, b) {
            (AggregationState::Extreme(mut a), AggregationState::Extreme(b)) => {
                if a.is_max != b.is_max {
                    return Err(EngineError::merge("cannot combine min and max states"));
                }
                self.accept(&mut a, b.value)?;
                Ok(AggregationState::Extreme(a))
            }
            (AggregationState::Extreme(_), other) | (other, _) => {
                Err(unexpected_state(self.kind.name(), &other))
            }
        }
    }

    fn finalize(&self, state: AggregationState) -> EngineResult<Value> {
        match state {
            AggregationState::Extreme(state) => Ok(state.value),
            other => Err(unexpected_state(self.kind.name(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: ExtremeKind, data_type: DataType, values: Vec<Value>) -> Value {
        let f = ExtremeAggregation::resolve(kind, &[data_type]).unwrap();
        let mut state = f.initial();
        for v in values {
            f.iterate(&mut state, &[v]).unwrap();
        }
        f.finalize(state).unwrap()
    }

    #[test]
    fn test_min_and_max_skip_nulls() {
        let values = vec![Value::Integer(5), Value::Null, Value::Integer(-2), Value::Integer(9)];
        assert_eq!(run(ExtremeKind::Min, DataType::Integer, values.clone()), Value::Integer(-2));
        assert_eq!(run(ExtremeKind::Max, DataType::Integer, values), Value::Integer(9));
    }

    #[test]
    fn test_string_max_keeps_type() {
        let f = ExtremeAggregation::resolve(ExtremeKind::Max, &[DataType::String]).unwrap();
        assert_eq!(f.info().return_type, DataType::String);
        assert_eq!(
            run(ExtremeKind::Max, DataType::String, vec![Value::from("a"), Value::from("c")]),
            Value::from("c")
        );
    }

    #[test]
    fn test_min_of_nothing_is_null() {
        assert_eq!(run(ExtremeKind::Min, DataType::Double, vec![]), Value::Null);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let f = ExtremeAggregation::resolve(ExtremeKind::Min, &[DataType::Long]).unwrap();
        let mut a = f.initial();
        f.iterate(&mut a, &[Value::Long(3)]).unwrap();
        let mut b = f.initial();
        f.iterate(&mut b, &[Value::Long(1)]).unwrap();
        let ab = f.merge(a.clone(), b.clone()).unwrap();
        let ba = f.merge(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(f.finalize(ab).unwrap(), Value::Long(1));
    }
}
