//! TopN projector

use std::sync::Arc;

use super::{CancelFlag, Expression, Projector, RowSorter};
use crate::errors::EngineResult;
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::{Bucket, Row};

/// Sorts (when ordered), skips `offset` rows and keeps at most `limit`
#[derive(Debug)]
pub struct TopNProjector {
    outputs: Arc<Vec<Expression>>,
    sorter: RowSorter,
    limit: Option<usize>,
    offset: usize,
    granularity: RowGranularity,
}

impl TopNProjector {
    pub fn new(
        outputs: Vec<Expression>,
        sorter: RowSorter,
        limit: Option<usize>,
        offset: usize,
        granularity: RowGranularity,
    ) -> Self {
        Self {
            outputs: Arc::new(outputs),
            sorter,
            limit,
            offset,
            granularity,
        }
    }

    fn window(&self, rows: Vec<Row>) -> impl Iterator<Item = Row> {
        rows.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
    }
}

impl Projector for TopNProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::TopN
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        if self.sorter.is_empty() {
            if let Bucket::Streamed(rows) = input {
                let outputs = Arc::clone(&self.outputs);
                let cancel = cancel.clone();
                let limited = rows
                    .skip(self.offset)
                    .take(self.limit.unwrap_or(usize::MAX))
                    .map(move |row| {
                        cancel.check()?;
                        Expression::project(&outputs, &row?)
                    });
                return Ok(Bucket::streamed(limited));
            }
        }
        let mut rows = input.into_rows()?;
        if !self.sorter.is_empty() {
            rows = self.sorter.sort(rows, cancel)?;
        }
        let projected = self
            .window(rows)
            .map(|row| Expression::project(&self.outputs, &row))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Bucket::materialized(projected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SortKey;
    use crate::types::Value;

    fn numbers(n: i64) -> Vec<Row> {
        (0..n).map(|v| vec![Value::Long(v)]).collect()
    }

    #[test]
    fn test_offset_then_limit_after_sort() {
        let sorter = RowSorter::new(vec![SortKey {
            expression: Expression::Input(0),
            descending: true,
            nulls_first: true,
        }]);
        let mut topn = TopNProjector::new(vec![Expression::Input(0)], sorter, Some(2), 1, RowGranularity::Cluster);
        let out = topn
            .apply(Bucket::materialized(numbers(5)), &CancelFlag::new())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(out, vec![vec![Value::Long(3)], vec![Value::Long(2)]]);
    }

    #[test]
    fn test_unordered_stream_stays_lazy() {
        let mut topn = TopNProjector::new(
            vec![Expression::Input(0)],
            RowSorter::new(vec![]),
            Some(3),
            0,
            RowGranularity::Cluster,
        );
        // an endless stream only works if the limit is applied lazily
        let endless = Bucket::streamed((0i64..).map(|v| Ok(vec![Value::Long(v)])));
        let out = topn.apply(endless, &CancelFlag::new()).unwrap();
        assert!(out.is_streamed());
        assert_eq!(out.into_rows().unwrap().len(), 3);
    }

    #[test]
    fn test_offset_past_end() {
        let mut topn = TopNProjector::new(
            vec![Expression::Input(0)],
            RowSorter::new(vec![]),
            None,
            10,
            RowGranularity::Cluster,
        );
        let out = topn
            .apply(Bucket::materialized(numbers(3)), &CancelFlag::new())
            .unwrap();
        assert_eq!(out.size(), Some(0));
    }
}
