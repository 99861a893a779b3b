//! count(*) and count(x)

use super::state::unexpected_state;
use super::{AggregateFunction, AggregationState, CountState};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

pub const NAME: &str = "count";

/// Counts rows, or non-null argument values when called with one argument
#[derive(Debug)]
pub struct CountAggregation {
    info: FunctionInfo,
}

impl CountAggregation {
    pub fn resolve(argument_types: &[DataType]) -> EngineResult<Self> {
        if argument_types.len() > 1 {
            return Err(EngineError::type_resolution(format!(
                "count takes at most one argument, got {}",
                argument_types.len()
            )));
        }
        if argument_types.contains(&DataType::AggregationState) {
            return Err(EngineError::type_resolution(
                "count cannot be applied to an aggregation state",
            ));
        }
        Ok(Self {
            info: FunctionInfo::new(
                FunctionIdent::new(NAME, argument_types.to_vec()),
                DataType::Long,
                FunctionKind::Aggregate,
            ),
        })
    }

    fn counts_rows(&self) -> bool {
        self.info.ident.argument_types.is_empty()
    }
}

impl AggregateFunction for CountAggregation {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn initial(&self) -> AggregationState {
        AggregationState::Count(CountState::default())
    }

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()> {
        match state {
            AggregationState::Count(state) => {
                if self.counts_rows() || args.first().is_some_and(|v| !v.is_null()) {
                    state.count += 1;
                }
                Ok(())
            }
            other => Err(unexpected_state(NAME, other)),
        }
    }

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState> {
        match (a, b) {
            (AggregationState::Count(a), AggregationState::Count(b)) => {
                Ok(AggregationState::Count(CountState {
                    count: a.count + b.count,
                }))
            }
            (AggregationState::Count(_), other) | (other, _) => {
                Err(unexpected_state(NAME, &other))
            }
        }
    }

    fn finalize(&self, state: AggregationState) -> EngineResult<Value> {
        match state {
            AggregationState::Count(state) => i64::try_from(state.count)
                .map(Value::Long)
                .map_err(|_| EngineError::execution("count exceeds the long range")),
            other => Err(unexpected_state(NAME, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_nulls_with_argument() {
        let count = CountAggregation::resolve(&[DataType::String]).unwrap();
        let mut state = count.initial();
        for value in [Value::from("a"), Value::Null, Value::from("b")] {
            count.iterate(&mut state, &[value]).unwrap();
        }
        assert_eq!(count.finalize(state).unwrap(), Value::Long(2));
    }

    #[test]
    fn test_count_rows_counts_everything() {
        let count = CountAggregation::resolve(&[]).unwrap();
        let mut state = count.initial();
        count.iterate(&mut state, &[]).unwrap();
        count.iterate(&mut state, &[]).unwrap();
        assert_eq!(count.finalize(state).unwrap(), Value::Long(2));
    }

    #[test]
    fn test_empty_count_is_zero() {
        let count = CountAggregation::resolve(&[DataType::Integer]).unwrap();
        assert_eq!(count.finalize(count.initial()).unwrap(), Value::Long(0));
    }

    #[test]
    fn test_merge_rejects_foreign_state() {
        let count = CountAggregation::resolve(&[]).unwrap();
        let foreign = AggregationState::Variance(Default::default());
        let err = count.merge(count.initial(), foreign).unwrap_err();
        assert!(err.is_fatal());
    }
}
