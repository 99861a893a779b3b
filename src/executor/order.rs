//! Order projector

use super::{CancelFlag, Expression, Projector, RowSorter};
use crate::errors::EngineResult;
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::Bucket;

/// Sorts the whole input, then projects onto the outputs
#[derive(Debug)]
pub struct OrderProjector {
    outputs: Vec<Expression>,
    sorter: RowSorter,
    granularity: RowGranularity,
}

impl OrderProjector {
    pub fn new(outputs: Vec<Expression>, sorter: RowSorter, granularity: RowGranularity) -> Self {
        Self {
            outputs,
            sorter,
            granularity,
        }
    }
}

impl Projector for OrderProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::Order
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        let sorted = self.sorter.sort(input.into_rows()?, cancel)?;
        let rows = sorted
            .iter()
            .map(|row| Expression::project(&self.outputs, row))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Bucket::materialized(rows))
    }
}
