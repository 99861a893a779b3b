//! Execution granularity levels

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};

/// Where in the cluster a stage runs, from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowGranularity {
    Doc = 0,
    Shard = 1,
    Node = 2,
    Cluster = 3,
}

impl RowGranularity {
    pub fn as_str(self) -> &'static str {
        match self {
            RowGranularity::Doc => "DOC",
            RowGranularity::Shard => "SHARD",
            RowGranularity::Node => "NODE",
            RowGranularity::Cluster => "CLUSTER",
        }
    }

    pub fn write_to(self, out: &mut StreamOutput) {
        out.write_u8(self as u8);
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        match input.read_u8()? {
            0 => Ok(RowGranularity::Doc),
            1 => Ok(RowGranularity::Shard),
            2 => Ok(RowGranularity::Node),
            3 => Ok(RowGranularity::Cluster),
            other => Err(EngineError::serialization(format!(
                "unknown row granularity {other}"
            ))),
        }
    }
}

impl fmt::Display for RowGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
