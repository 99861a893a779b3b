//! Sort keys and the sort-only projection

use serde::{Deserialize, Serialize};

use super::RowGranularity;
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::Symbol;

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub symbol: Symbol,
    #[serde(default)]
    pub descending: bool,
    /// Explicit null placement; defaults to last ascending, first descending
    #[serde(default)]
    pub nulls_first: Option<bool>,
}

impl OrderBy {
    pub fn asc(symbol: Symbol) -> Self {
        Self {
            symbol,
            descending: false,
            nulls_first: None,
        }
    }

    pub fn desc(symbol: Symbol) -> Self {
        Self {
            symbol,
            descending: true,
            nulls_first: None,
        }
    }

    pub fn with_nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = Some(nulls_first);
        self
    }

    pub fn effective_nulls_first(&self) -> bool {
        self.nulls_first.unwrap_or(self.descending)
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        self.symbol.write_to(out)?;
        out.write_bool(self.descending);
        out.write_u8(match self.nulls_first {
            None => 0,
            Some(true) => 1,
            Some(false) => 2,
        });
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let symbol = Symbol::read_from(input)?;
        let descending = input.read_bool()?;
        let nulls_first = match input.read_u8()? {
            0 => None,
            1 => Some(true),
            2 => Some(false),
            other => {
                return Err(EngineError::serialization(format!(
                    "unknown null ordering {other}"
                )))
            }
        };
        Ok(Self {
            symbol,
            descending,
            nulls_first,
        })
    }
}

pub(super) fn write_order_by(order_by: &[OrderBy], out: &mut StreamOutput) -> EngineResult<()> {
    out.write_vlong(order_by.len() as u64);
    for key in order_by {
        key.write_to(out)?;
    }
    Ok(())
}

pub(super) fn read_order_by(input: &mut StreamInput<'_>) -> EngineResult<Vec<OrderBy>> {
    input.read_collection(OrderBy::read_from)
}

/// Sorts all rows without limiting them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderProjection {
    outputs: Vec<Symbol>,
    order_by: Vec<OrderBy>,
    #[serde(default = "default_granularity")]
    granularity: RowGranularity,
}

fn default_granularity() -> RowGranularity {
    RowGranularity::Cluster
}

impl OrderProjection {
    pub fn new(outputs: Vec<Symbol>, order_by: Vec<OrderBy>) -> Self {
        Self {
            outputs,
            order_by,
            granularity: default_granularity(),
        }
    }

    pub fn with_granularity(mut self, granularity: RowGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn outputs(&self) -> &[Symbol] {
        &self.outputs
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        Symbol::write_all(&self.outputs, out)?;
        write_order_by(&self.order_by, out)?;
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            outputs: Symbol::read_all(input)?,
            order_by: read_order_by(input)?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}
