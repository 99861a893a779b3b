//! Filter projector

use std::sync::Arc;

use super::{CancelFlag, Expression, Projector};
use crate::errors::{EngineError, EngineResult};
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::{Bucket, Row};
use crate::types::Value;

#[derive(Debug)]
struct Predicate {
    query: Expression,
    outputs: Vec<Expression>,
}

impl Predicate {
    /// `Some(projected row)` for a matching row, `None` otherwise
    fn apply(&self, row: Row) -> EngineResult<Option<Row>> {
        match self.query.evaluate(&row)? {
            Value::Boolean(true) => Expression::project(&self.outputs, &row).map(Some),
            Value::Boolean(false) | Value::Null => Ok(None),
            other => Err(EngineError::execution(format!(
                "filter query must be boolean, got {}",
                other.data_type()
            ))),
        }
    }
}

/// Passes rows whose query is true; lazy over streamed input
#[derive(Debug)]
pub struct FilterProjector {
    predicate: Arc<Predicate>,
    granularity: RowGranularity,
}

impl FilterProjector {
    pub fn new(query: Expression, outputs: Vec<Expression>, granularity: RowGranularity) -> Self {
        Self {
            predicate: Arc::new(Predicate { query, outputs }),
            granularity,
        }
    }
}

impl Projector for FilterProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::Filter
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        match input {
            Bucket::Materialized(rows) => {
                let mut kept = Vec::new();
                for row in rows {
                    cancel.check()?;
                    if let Some(row) = self.predicate.apply(row)? {
                        kept.push(row);
                    }
                }
                Ok(Bucket::Materialized(kept))
            }
            Bucket::Streamed(rows) => {
                let predicate = Arc::clone(&self.predicate);
                let cancel = cancel.clone();
                Ok(Bucket::streamed(rows.filter_map(move |row| {
                    let step = cancel
                        .check()
                        .and_then(|()| row)
                        .and_then(|row| predicate.apply(row));
                    step.transpose()
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::symbol::Symbol;
    use crate::types::DataType;

    fn gt_five() -> FilterProjector {
        let registry = FunctionRegistry::new();
        let info = registry
            .scalar_info("gt", &[DataType::Integer, DataType::Integer])
            .unwrap();
        let query = Symbol::function(
            info,
            vec![Symbol::reference(0, DataType::Integer), Symbol::literal(5i32)],
        );
        FilterProjector::new(
            Expression::compile(&query, &registry).unwrap(),
            vec![Expression::Input(1)],
            RowGranularity::Shard,
        )
    }

    fn rows() -> Vec<Row> {
        vec![
            vec![Value::Integer(9), Value::from("keep")],
            vec![Value::Null, Value::from("null query")],
            vec![Value::Integer(1), Value::from("drop")],
        ]
    }

    #[test]
    fn test_null_query_excludes_row() {
        let mut filter = gt_five();
        let out = filter
            .execute(Bucket::materialized(rows()), RowGranularity::Shard, &CancelFlag::new())
            .unwrap();
        assert_eq!(out.into_rows().unwrap(), vec![vec![Value::from("keep")]]);
    }

    #[test]
    fn test_streamed_input_stays_lazy() {
        let mut filter = gt_five();
        let input = Bucket::streamed(rows().into_iter().map(Ok));
        let out = filter
            .execute(input, RowGranularity::Node, &CancelFlag::new())
            .unwrap();
        assert!(out.is_streamed());
        assert_eq!(out.into_rows().unwrap().len(), 1);
    }

    #[test]
    fn test_non_boolean_query_is_execution_error() {
        let mut filter = FilterProjector::new(
            Expression::Literal(Value::Integer(1)),
            vec![],
            RowGranularity::Shard,
        );
        let err = filter
            .execute(Bucket::materialized(rows()), RowGranularity::Shard, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }

    #[test]
    fn test_cancelled_stream_surfaces_error() {
        let mut filter = gt_five();
        let cancel = CancelFlag::new();
        let out = filter
            .execute(Bucket::streamed(rows().into_iter().map(Ok)), RowGranularity::Shard, &cancel)
            .unwrap();
        cancel.cancel();
        assert_eq!(out.into_rows().unwrap_err(), EngineError::Cancelled);
    }
}
