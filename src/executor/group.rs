//! Grouped aggregation projector

use std::collections::HashMap;

use super::aggregation::Aggregator;
use super::{CancelFlag, Expression, Projector};
use crate::aggregation::AggregationState;
use crate::errors::EngineResult;
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::{Bucket, Row};

/// Aggregates per distinct key; groups are emitted in first-seen order
#[derive(Debug)]
pub struct GroupProjector {
    keys: Vec<Expression>,
    aggregators: Vec<Aggregator>,
    granularity: RowGranularity,
}

impl GroupProjector {
    pub fn new(keys: Vec<Expression>, aggregators: Vec<Aggregator>, granularity: RowGranularity) -> Self {
        Self {
            keys,
            aggregators,
            granularity,
        }
    }
}

impl Projector for GroupProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::Group
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        let mut index: HashMap<Row, usize> = HashMap::new();
        let mut groups: Vec<(Row, Vec<AggregationState>)> = Vec::new();

        for row in input.into_row_iter() {
            cancel.check()?;
            let row = row?;
            let key = Expression::project(&self.keys, &row)?;
            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    let states = self.aggregators.iter().map(Aggregator::initial).collect();
                    groups.push((key.clone(), states));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let states = &mut groups[slot].1;
            for (aggregator, state) in self.aggregators.iter().zip(states.iter_mut()) {
                aggregator.accumulate(state, &row)?;
            }
        }

        let mut output = Vec::with_capacity(groups.len());
        for (mut key, states) in groups {
            for (aggregator, state) in self.aggregators.iter().zip(states) {
                key.push(aggregator.emit(state)?);
            }
            output.push(key);
        }
        Ok(Bucket::materialized(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::projection::AggregateStep;
    use crate::symbol::FunctionIdent;
    use crate::types::Value;

    fn count_by_first_column() -> GroupProjector {
        let registry = FunctionRegistry::new();
        let count = registry
            .resolve_aggregate(&FunctionIdent::new("count", vec![]))
            .unwrap();
        GroupProjector::new(
            vec![Expression::Input(0)],
            vec![Aggregator::new(count, vec![], AggregateStep::Iter, AggregateStep::Final)],
            RowGranularity::Node,
        )
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let rows = vec![
            vec![Value::from("b")],
            vec![Value::from("a")],
            vec![Value::from("b")],
            vec![Value::Null],
        ];
        let out = count_by_first_column()
            .apply(Bucket::materialized(rows), &CancelFlag::new())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(
            out,
            vec![
                vec![Value::from("b"), Value::Long(2)],
                vec![Value::from("a"), Value::Long(1)],
                vec![Value::Null, Value::Long(1)],
            ]
        );
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        let out = count_by_first_column()
            .apply(Bucket::empty(), &CancelFlag::new())
            .unwrap();
        assert_eq!(out.size(), Some(0));
    }
}
