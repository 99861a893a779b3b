//! Global aggregation projection and aggregate calls

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RowGranularity;
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::{FunctionInfo, FunctionKind, Symbol};
use crate::types::DataType;

/// Representation of aggregate values at a stage boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStep {
    /// Raw input rows
    Iter,
    /// AggregationState values
    Partial,
    /// Finalized values
    Final,
}

impl AggregateStep {
    fn id(self) -> u8 {
        match self {
            AggregateStep::Iter => 0,
            AggregateStep::Partial => 1,
            AggregateStep::Final => 2,
        }
    }

    fn from_id(id: u8) -> EngineResult<Self> {
        match id {
            0 => Ok(AggregateStep::Iter),
            1 => Ok(AggregateStep::Partial),
            2 => Ok(AggregateStep::Final),
            other => Err(EngineError::serialization(format!(
                "unknown aggregate step {other}"
            ))),
        }
    }
}

impl fmt::Display for AggregateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateStep::Iter => write!(f, "iter"),
            AggregateStep::Partial => write!(f, "partial"),
            AggregateStep::Final => write!(f, "final"),
        }
    }
}

/// One aggregate call within an Aggregation or Group projection.
///
/// With `from_step == Partial` the single input is a reference to the
/// column holding the partial state of the previous stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregation {
    pub info: FunctionInfo,
    pub inputs: Vec<Symbol>,
    pub from_step: AggregateStep,
    pub to_step: AggregateStep,
}

impl Aggregation {
    pub fn new(
        info: FunctionInfo,
        inputs: Vec<Symbol>,
        from_step: AggregateStep,
        to_step: AggregateStep,
    ) -> Self {
        Self {
            info,
            inputs,
            from_step,
            to_step,
        }
    }

    /// Type of the column this aggregation produces
    pub fn value_type(&self) -> DataType {
        match self.to_step {
            AggregateStep::Partial => DataType::AggregationState,
            _ => self.info.return_type,
        }
    }

    /// Rejects step combinations and kinds no aggregator can execute
    pub fn validate(&self) -> EngineResult<()> {
        if self.info.kind != FunctionKind::Aggregate {
            return Err(EngineError::invalid_plan(format!(
                "{} is not an aggregate function",
                self.info.ident
            )));
        }
        match (self.from_step, self.to_step) {
            (AggregateStep::Iter, AggregateStep::Partial | AggregateStep::Final) => Ok(()),
            (AggregateStep::Partial, AggregateStep::Partial | AggregateStep::Final) => {
                if self.inputs.len() == 1 {
                    Ok(())
                } else {
                    Err(EngineError::invalid_plan(format!(
                        "{} merging partial states needs exactly one state input",
                        self.info.name()
                    )))
                }
            }
            (from, to) => Err(EngineError::invalid_plan(format!(
                "{} cannot go from {} to {}",
                self.info.name(),
                from,
                to
            ))),
        }
    }

    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        self.info.write_to(out);
        Symbol::write_all(&self.inputs, out)?;
        out.write_u8(self.from_step.id());
        out.write_u8(self.to_step.id());
        Ok(())
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            info: FunctionInfo::read_from(input)?,
            inputs: Symbol::read_all(input)?,
            from_step: AggregateStep::from_id(input.read_u8()?)?,
            to_step: AggregateStep::from_id(input.read_u8()?)?,
        })
    }
}

/// Output references for a list of aggregations starting at `offset`
pub(super) fn aggregation_outputs(aggregations: &[Aggregation], offset: usize) -> Vec<Symbol> {
    aggregations
        .iter()
        .enumerate()
        .map(|(i, a)| Symbol::reference((offset + i) as u32, a.value_type()))
        .collect()
}

pub(super) fn write_aggregations(
    aggregations: &[Aggregation],
    out: &mut StreamOutput,
) -> EngineResult<()> {
    out.write_vlong(aggregations.len() as u64);
    for aggregation in aggregations {
        aggregation.write_to(out)?;
    }
    Ok(())
}

/// Aggregates all input rows into a single output row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationProjection {
    aggregations: Vec<Aggregation>,
    granularity: RowGranularity,
}

impl AggregationProjection {
    pub fn new(aggregations: Vec<Aggregation>, granularity: RowGranularity) -> Self {
        Self {
            aggregations,
            granularity,
        }
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn outputs(&self) -> Vec<Symbol> {
        aggregation_outputs(&self.aggregations, 0)
    }

    pub fn required_granularity(&self) -> RowGranularity {
        self.granularity
    }

    pub(super) fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        write_aggregations(&self.aggregations, out)?;
        self.granularity.write_to(out);
        Ok(())
    }

    pub(super) fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            aggregations: input.read_collection(Aggregation::read_from)?,
            granularity: RowGranularity::read_from(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::FunctionIdent;

    fn variance_info() -> FunctionInfo {
        FunctionInfo::new(
            FunctionIdent::new("variance", vec![DataType::Double]),
            DataType::Double,
            FunctionKind::Aggregate,
        )
    }

    #[test]
    fn test_partial_output_is_state_typed() {
        let partial = Aggregation::new(
            variance_info(),
            vec![Symbol::reference(0, DataType::Double)],
            AggregateStep::Iter,
            AggregateStep::Partial,
        );
        assert_eq!(partial.value_type(), DataType::AggregationState);
        let projection = AggregationProjection::new(vec![partial], RowGranularity::Shard);
        assert_eq!(
            projection.outputs(),
            vec![Symbol::reference(0, DataType::AggregationState)]
        );
    }

    #[test]
    fn test_backwards_step_is_invalid() {
        let backwards = Aggregation::new(
            variance_info(),
            vec![Symbol::reference(0, DataType::AggregationState)],
            AggregateStep::Final,
            AggregateStep::Partial,
        );
        assert!(matches!(
            backwards.validate(),
            Err(EngineError::InvalidPlan(_))
        ));
    }
}
