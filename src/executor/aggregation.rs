//! Global aggregation projector and the per-call aggregator it shares with grouping

use std::mem;
use std::sync::Arc;

use super::{CancelFlag, Expression, Projector};
use crate::aggregation::{AggregateFunction, AggregationState};
use crate::errors::{EngineError, EngineResult};
use crate::projection::{AggregateStep, ProjectionType, RowGranularity};
use crate::row::Bucket;
use crate::types::Value;

/// One compiled aggregate call
#[derive(Debug)]
pub struct Aggregator {
    function: Arc<dyn AggregateFunction>,
    inputs: Vec<Expression>,
    from_step: AggregateStep,
    to_step: AggregateStep,
}

impl Aggregator {
    pub fn new(
        function: Arc<dyn AggregateFunction>,
        inputs: Vec<Expression>,
        from_step: AggregateStep,
        to_step: AggregateStep,
    ) -> Self {
        Self {
            function,
            inputs,
            from_step,
            to_step,
        }
    }

    pub fn initial(&self) -> AggregationState {
        self.function.initial()
    }

    /// Folds one input row into the state
    pub fn accumulate(&self, state: &mut AggregationState, row: &[Value]) -> EngineResult<()> {
        if self.from_step == AggregateStep::Iter {
            let args = Expression::project(&self.inputs, row)?;
            return self.function.iterate(state, &args);
        }
        let input = self.inputs.first().ok_or_else(|| {
            EngineError::invalid_plan("partial aggregation without a state input")
        })?;
        match input.evaluate(row)? {
            Value::State(incoming) => {
                let current = mem::replace(state, self.function.initial());
                *state = self.function.merge(current, *incoming)?;
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(EngineError::merge(format!(
                "{} expected a partial state, got a {} value",
                self.function.info().name(),
                other.data_type()
            ))),
        }
    }

    /// Output value at the target step
    pub fn emit(&self, state: AggregationState) -> EngineResult<Value> {
        match self.to_step {
            AggregateStep::Partial => Ok(Value::State(Box::new(state))),
            _ => self.function.finalize(state),
        }
    }
}

/// Aggregates the whole input into exactly one row
#[derive(Debug)]
pub struct AggregationProjector {
    aggregators: Vec<Aggregator>,
    granularity: RowGranularity,
}

impl AggregationProjector {
    pub fn new(aggregators: Vec<Aggregator>, granularity: RowGranularity) -> Self {
        Self {
            aggregators,
            granularity,
        }
    }
}

impl Projector for AggregationProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::Aggregation
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        let mut states: Vec<AggregationState> =
            self.aggregators.iter().map(Aggregator::initial).collect();
        for row in input.into_row_iter() {
            cancel.check()?;
            let row = row?;
            for (aggregator, state) in self.aggregators.iter().zip(states.iter_mut()) {
                aggregator.accumulate(state, &row)?;
            }
        }
        let row = self
            .aggregators
            .iter()
            .zip(states)
            .map(|(aggregator, state)| aggregator.emit(state))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Bucket::materialized(vec![row]))
    }
}
