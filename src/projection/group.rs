//! Grouped aggregation projection

use serde::{Deserialize, Serialize};

use super::aggregation::{aggregation_outputs, write_aggregations, Aggregation};
use super::RowGranularity;
use crate::errors::EngineResult;
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::Symbol;

/// Aggregates rows per distinct key; outputs the keys followed by the aggregates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupProjection {
    keys: Vec<Symbol>,
    aggregations: Vec<Aggregation>,
    granularity: RowGranularity,
}

impl GroupProjection {
    pub fn new(
        keys: Vec<Symbol>,
        aggregations: Vec<Aggregation>,
        granularity: RowGranularity,
    ) -> Self {
        Self {
            keys,
            aggregations,
            granularity,
        }
    }

    pub fn keys(&self) -> &[Symbol] {
        &self.keys
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn outputs(&self) -> Vec<Symbol> {
        let mut outputs: Vec<Symbol> = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| Symbol::reference(i as u32, key.value_type()))
            .collect();
        outputs.extend(aggregation_outputs(&self.aggregations, self.keys.len()));
        outputs
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        Symbol::write_all(&self.keys, out)?;
        write_aggregations(&self.aggregations, out)?;
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            keys: Symbol::read_all(input)?,
            aggregations: input.read_collection(Aggregation::read_from)?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}
