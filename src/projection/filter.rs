//! Filter projection

use serde::{Deserialize, Serialize};

use super::RowGranularity;
use crate::errors::EngineResult;
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::Symbol;

/// Keeps rows whose query evaluates to true and projects them onto `outputs`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterProjection {
    query: Symbol,
    outputs: Vec<Symbol>,
    #[serde(default = "default_granularity")]
    granularity: RowGranularity,
}

fn default_granularity() -> RowGranularity {
    RowGranularity::Cluster
}

impl FilterProjection {
    pub fn new(query: Symbol, outputs: Vec<Symbol>) -> Self {
        Self {
            query,
            outputs,
            granularity: default_granularity(),
        }
    }

    /// Overrides the default CLUSTER requirement
    pub fn with_granularity(mut self, granularity: RowGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn query(&self) -> &Symbol {
        &self.query
    }

    pub fn outputs(&self) -> &[Symbol] {
        &self.outputs
    }

    pub fn set_outputs(&mut self, outputs: Vec<Symbol>) {
        self.outputs = outputs;
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        self.query.write_to(out)?;
        Symbol::write_all(&self.outputs, out)?;
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            query: Symbol::read_from(input)?,
            outputs: Symbol::read_all(input)?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}
