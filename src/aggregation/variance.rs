//! variance(x) and stddev(x)
//!
//! Population variance over a streaming Welford accumulator. Partial
//! states from different shards combine with the parallel formula of
//! Chan et al.; both orders of a merge produce bit-identical results.

use std::cmp::Ordering;

use super::state::unexpected_state;
use super::{AggregateFunction, AggregationState, VarianceState};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

pub const VARIANCE: &str = "variance";
pub const STDDEV: &str = "stddev";

impl VarianceState {
    /// Welford update with one observation
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combines two partial states
    pub fn merge(self, other: VarianceState) -> VarianceState {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let (a, b) = if self.canonical_cmp(&other) == Ordering::Greater {
            (other, self)
        } else {
            (self, other)
        };
        let count = a.count + b.count;
        let n = count as f64;
        let delta = b.mean - a.mean;
        VarianceState {
            count,
            mean: a.mean + delta * b.count as f64 / n,
            m2: a.m2 + b.m2 + delta * delta * a.count as f64 * b.count as f64 / n,
        }
    }

    /// Population variance; `None` without observations
    pub fn result(self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => Some(self.m2 / n as f64),
        }
    }

    fn canonical_cmp(&self, other: &VarianceState) -> Ordering {
        (self.count, self.mean.to_bits(), self.m2.to_bits()).cmp(&(
            other.count,
            other.mean.to_bits(),
            other.m2.to_bits(),
        ))
    }
}

#[derive(Debug)]
pub struct VarianceAggregation {
    info: FunctionInfo,
    stddev: bool,
}

impl VarianceAggregation {
    pub fn resolve_variance(argument_types: &[DataType]) -> EngineResult<Self> {
        Self::resolve(VARIANCE, argument_types, false)
    }

    pub fn resolve_stddev(argument_types: &[DataType]) -> EngineResult<Self> {
        Self::resolve(STDDEV, argument_types, true)
    }

    fn resolve(name: &str, argument_types: &[DataType], stddev: bool) -> EngineResult<Self> {
        let ident = FunctionIdent::new(name, argument_types.to_vec());
        match argument_types {
            [t] if t.is_numeric_or_timestamp() => Ok(Self {
                info: FunctionInfo::new(ident, DataType::Double, FunctionKind::Aggregate),
                stddev,
            }),
            _ => Err(EngineError::type_resolution(format!(
                "{name} is not defined for {ident}"
            ))),
        }
    }
}

impl AggregateFunction for VarianceAggregation {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn initial(&self) -> AggregationState {
        AggregationState::Variance(VarianceState::default())
    }

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()> {
        match state {
            AggregationState::Variance(state) => {
                if let Some(v) = args.first().and_then(Value::as_f64) {
                    state.add(v);
                }
                Ok(())
            }
            other => Err(unexpected_state(VARIANCE, other)),
        }
    }

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState> {
        match (a, b) {
            (AggregationState::Variance(a), AggregationState::Variance(b)) => {
                Ok(AggregationState::Variance(a.merge(b)))
            }
            (AggregationState::Variance(_), other) | (other, _) => {
                Err(unexpected_state(VARIANCE, &other))
            }
        }
    }

    fn finalize(&self, state: AggregationState) -> EngineResult<Value> {
        match state {
            AggregationState::Variance(state) => {
                let variance = state.result();
                Ok(Value::from(if self.stddev {
                    variance.map(f64::sqrt)
                } else {
                    variance
                }))
            }
            other => Err(unexpected_state(VARIANCE, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variance_of(data_type: DataType, values: &[Value]) -> Value {
        let f = VarianceAggregation::resolve_variance(&[data_type]).unwrap();
        let mut state = f.initial();
        for v in values {
            f.iterate(&mut state, std::slice::from_ref(v)).unwrap();
        }
        f.finalize(state).unwrap()
    }

    #[test]
    fn test_known_values() {
        assert_eq!(
            variance_of(DataType::Integer, &[Value::Integer(7), Value::Integer(3)]),
            Value::Double(4.0)
        );
        assert_eq!(
            variance_of(DataType::Integer, &[Value::Integer(1), Value::Integer(1)]),
            Value::Double(0.0)
        );
        assert_eq!(
            variance_of(DataType::Float, &[Value::Float(0.7), Value::Float(0.3), Value::Float(0.7)]),
            Value::Double(0.035555551317003165)
        );
    }

    #[test]
    fn test_nulls_and_single_value() {
        assert_eq!(
            variance_of(DataType::Long, &[Value::Null, Value::Null]),
            Value::Null
        );
        assert_eq!(
            variance_of(DataType::Long, &[Value::Long(12)]),
            Value::Double(0.0)
        );
    }

    #[test]
    fn test_stddev() {
        let f = VarianceAggregation::resolve_stddev(&[DataType::Double]).unwrap();
        let mut state = f.initial();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            f.iterate(&mut state, &[Value::Double(v)]).unwrap();
        }
        assert_eq!(f.finalize(state).unwrap(), Value::Double(2.0));
    }

    #[test]
    fn test_merge_is_bit_identical_both_ways() {
        let mut a = VarianceState::default();
        for v in [0.1, 12.5, 3.25] {
            a.add(v);
        }
        let mut b = VarianceState::default();
        for v in [7.0, -1.75] {
            b.add(v);
        }
        let ab = a.merge(b);
        let ba = b.merge(a);
        assert_eq!(ab.count, 5);
        assert_eq!(ab.mean.to_bits(), ba.mean.to_bits());
        assert_eq!(ab.m2.to_bits(), ba.m2.to_bits());
    }

    #[test]
    fn test_empty_side_returns_other() {
        let mut a = VarianceState::default();
        a.add(3.0);
        a.add(5.0);
        assert_eq!(a.merge(VarianceState::default()), a);
        assert_eq!(VarianceState::default().merge(a), a);
    }

    #[test]
    fn test_string_is_rejected_at_resolution() {
        let err = VarianceAggregation::resolve_variance(&[DataType::String]).unwrap_err();
        assert!(matches!(err, EngineError::TypeResolution(_)));
    }
}
