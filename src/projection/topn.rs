//! Order plus limit/offset

use serde::{Deserialize, Serialize};

use super::order::{read_order_by, write_order_by, OrderBy};
use super::RowGranularity;
use crate::errors::EngineResult;
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::Symbol;

/// Optionally sorts, then skips `offset` rows and keeps at most `limit`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopNProjection {
    outputs: Vec<Symbol>,
    #[serde(default)]
    order_by: Vec<OrderBy>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_granularity")]
    granularity: RowGranularity,
}

fn default_granularity() -> RowGranularity {
    RowGranularity::Cluster
}

impl TopNProjection {
    pub fn new(outputs: Vec<Symbol>, order_by: Vec<OrderBy>, limit: Option<u64>, offset: u64) -> Self {
        Self {
            outputs,
            order_by,
            limit,
            offset,
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

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        Symbol::write_all(&self.outputs, out)?;
        write_order_by(&self.order_by, out)?;
        // limit + 1, zero meaning unlimited
        out.write_vlong(self.limit.map_or(0, |l| l.saturating_add(1)));
        out.write_vlong(self.offset);
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let outputs = Symbol::read_all(input)?;
        let order_by = read_order_by(input)?;
        let limit = match input.read_vlong()? {
            0 => None,
            n => Some(n - 1),
        };
        Ok(Self {
            outputs,
            order_by,
            limit,
            offset: input.read_vlong()?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}
