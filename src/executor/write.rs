//! Write projector and the sink it writes to

use std::fmt;
use std::sync::{Arc, Mutex};

use super::{CancelFlag, Expression, Projector};
use crate::errors::{EngineError, EngineResult};
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::{Bucket, Row};
use crate::types::Value;

/// External destination for rows produced by a Write projection
pub trait RowSink: Send + Sync + fmt::Debug {
    fn write_row(&self, row: Row) -> EngineResult<()>;
}

/// Sink collecting rows in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<Row>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows written so far, in write order
    pub fn rows(&self) -> EngineResult<Vec<Row>> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .map_err(|_| EngineError::execution("memory sink lock poisoned"))
    }
}

impl RowSink for MemorySink {
    fn write_row(&self, row: Row) -> EngineResult<()> {
        self.rows
            .lock()
            .map_err(|_| EngineError::execution("memory sink lock poisoned"))?
            .push(row);
        Ok(())
    }
}

/// Writes each projected row to the sink and outputs `[count]`
#[derive(Debug)]
pub struct WriteProjector {
    inputs: Vec<Expression>,
    sink: Arc<dyn RowSink>,
    granularity: RowGranularity,
}

impl WriteProjector {
    pub fn new(inputs: Vec<Expression>, sink: Arc<dyn RowSink>, granularity: RowGranularity) -> Self {
        Self {
            inputs,
            sink,
            granularity,
        }
    }
}

impl Projector for WriteProjector {
    fn projection_type(&self) -> ProjectionType {
        ProjectionType::Write
    }

    fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket> {
        let mut written: i64 = 0;
        for row in input.into_row_iter() {
            cancel.check()?;
            let projected = Expression::project(&self.inputs, &row?)?;
            self.sink.write_row(projected)?;
            written += 1;
        }
        Ok(Bucket::materialized(vec![vec![Value::Long(written)]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_reach_sink_and_count_is_returned() {
        let sink = Arc::new(MemorySink::new());
        let mut write = WriteProjector::new(
            vec![Expression::Input(1)],
            sink.clone(),
            RowGranularity::Shard,
        );
        let input = Bucket::materialized(vec![
            vec![Value::Integer(1), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ]);
        let out = write
            .apply(input, &CancelFlag::new())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(out, vec![vec![Value::Long(2)]]);
        assert_eq!(
            sink.rows().unwrap(),
            vec![vec![Value::from("a")], vec![Value::from("b")]]
        );
    }
}
