//! Write projection

use serde::{Deserialize, Serialize};

use super::RowGranularity;
use crate::errors::EngineResult;
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::Symbol;
use crate::types::DataType;

/// Hands each projected row to an external sink and outputs `[count]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteProjection {
    inputs: Vec<Symbol>,
    #[serde(default = "default_granularity")]
    granularity: RowGranularity,
}

fn default_granularity() -> RowGranularity {
    RowGranularity::Shard
}

impl WriteProjection {
    pub fn new(inputs: Vec<Symbol>) -> Self {
        Self {
            inputs,
            granularity: default_granularity(),
        }
    }

    pub fn with_granularity(mut self, granularity: RowGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Columns written to the sink
    pub fn inputs(&self) -> &[Symbol] {
        &self.inputs
    }

    pub fn outputs(&self) -> Vec<Symbol> {
        vec![Symbol::reference(0, DataType::Long)]
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        Symbol::write_all(&self.inputs, out)?;
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            inputs: Symbol::read_all(input)?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}
