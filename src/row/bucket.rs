//! Bucket implementation

use std::fmt;

use super::Row;
use crate::errors::EngineResult;

/// Lazily produced rows; an `Err` aborts consumption of the bucket
pub type RowIter = Box<dyn Iterator<Item = EngineResult<Row>> + Send>;

/// Ordered sequence of rows
pub enum Bucket {
    Materialized(Vec<Row>),
    Streamed(RowIter),
}

impl Bucket {
    pub fn empty() -> Self {
        Bucket::Materialized(Vec::new())
    }

    pub fn materialized(rows: Vec<Row>) -> Self {
        Bucket::Materialized(rows)
    }

    /// Wraps a fallible row iterator without consuming it
    pub fn streamed<I>(rows: I) -> Self
    where
        I: Iterator<Item = EngineResult<Row>> + Send + 'static,
    {
        Bucket::Streamed(Box::new(rows))
    }

    /// Number of rows, or `None` for a streamed bucket
    pub fn size(&self) -> Option<usize> {
        match self {
            Bucket::Materialized(rows) => Some(rows.len()),
            Bucket::Streamed(_) => None,
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, Bucket::Streamed(_))
    }

    /// Drains the bucket into memory, stopping at the first failed row
    pub fn into_rows(self) -> EngineResult<Vec<Row>> {
        match self {
            Bucket::Materialized(rows) => Ok(rows),
            Bucket::Streamed(rows) => rows.collect(),
        }
    }

    /// Drains a streamed bucket so its size becomes known
    pub fn materialize(self) -> EngineResult<Self> {
        self.into_rows().map(Bucket::Materialized)
    }

    /// Row iterator over the bucket contents
    pub fn into_row_iter(self) -> RowIter {
        match self {
            Bucket::Materialized(rows) => Box::new(rows.into_iter().map(Ok)),
            Bucket::Streamed(rows) => rows,
        }
    }

    /// Concatenates buckets in order, keeping laziness if any input is lazy
    pub fn concat(buckets: Vec<Bucket>) -> Self {
        if buckets.iter().all(|b| !b.is_streamed()) {
            let mut all = Vec::new();
            for bucket in buckets {
                if let Bucket::Materialized(rows) = bucket {
                    all.extend(rows);
                }
            }
            return Bucket::Materialized(all);
        }
        Bucket::Streamed(Box::new(
            buckets.into_iter().flat_map(Bucket::into_row_iter),
        ))
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket::empty()
    }
}

impl From<Vec<Row>> for Bucket {
    fn from(rows: Vec<Row>) -> Self {
        Bucket::Materialized(rows)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Materialized(rows) => f.debug_tuple("Materialized").field(rows).finish(),
            Bucket::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}
