//! Row sorting for Order and TopN
//!
//! Sort is stable. Nulls sort last ascending and first descending unless a
//! key says otherwise.

use std::cmp::Ordering;

use super::{CancelFlag, Expression};
use crate::errors::EngineResult;
use crate::row::Row;
use crate::types::Value;

#[derive(Debug)]
pub struct SortKey {
    pub expression: Expression,
    pub descending: bool,
    pub nulls_first: bool,
}

/// Sorts rows by a list of keys
#[derive(Debug)]
pub struct RowSorter {
    keys: Vec<SortKey>,
}

impl RowSorter {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sorts rows by their evaluated keys
    pub fn sort(&self, rows: Vec<Row>, cancel: &CancelFlag) -> EngineResult<Vec<Row>> {
        let mut decorated = Vec::with_capacity(rows.len());
        for row in rows {
            cancel.check()?;
            let key = self
                .keys
                .iter()
                .map(|k| k.expression.evaluate(&row))
                .collect::<EngineResult<Vec<_>>>()?;
            decorated.push((key, row));
        }
        decorated.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        Ok(decorated.into_iter().map(|(_, row)| row).collect())
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (key, (a, b)) in self.keys.iter().zip(a.iter().zip(b)) {
            let ordering = Self::compare_values(a, b, key);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Compares two values for one key.
    ///
    /// Null placement does not flip with direction; values of types that
    /// cannot be ordered against each other compare equal.
    fn compare_values(a: &Value, b: &Value, key: &SortKey) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if key.nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if key.nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ordering = a.compare(b).unwrap_or(Ordering::Equal);
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    }
}
