//! Projection data model
//!
//! A projection describes one row-transforming stage. The closed set of
//! variants is dispatched through [`ProjectionVisitor`]; the executor turns
//! each variant into a projector.

mod aggregation;
mod filter;
mod granularity;
mod group;
mod order;
mod topn;
mod write;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use aggregation::{AggregateStep, Aggregation, AggregationProjection};
pub use filter::FilterProjection;
pub use granularity::RowGranularity;
pub use group::GroupProjection;
pub use order::{OrderBy, OrderProjection};
pub use topn::TopNProjection;
pub use write::WriteProjection;

use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::symbol::{Symbol, SymbolFormatter};

/// Projection discriminator, also the wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionType {
    Filter = 0,
    Aggregation = 1,
    Group = 2,
    TopN = 3,
    Order = 4,
    Write = 5,
}

impl ProjectionType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ProjectionType::Filter),
            1 => Some(ProjectionType::Aggregation),
            2 => Some(ProjectionType::Group),
            3 => Some(ProjectionType::TopN),
            4 => Some(ProjectionType::Order),
            5 => Some(ProjectionType::Write),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectionType::Filter => "FILTER",
            ProjectionType::Aggregation => "AGGREGATION",
            ProjectionType::Group => "GROUP",
            ProjectionType::TopN => "TOPN",
            ProjectionType::Order => "ORDER",
            ProjectionType::Write => "WRITE",
        }
    }
}

impl fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline stage description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    Filter(FilterProjection),
    Aggregation(AggregationProjection),
    Group(GroupProjection),
    #[serde(rename = "topn")]
    TopN(TopNProjection),
    Order(OrderProjection),
    Write(WriteProjection),
}

/// Exhaustive dispatch over projection variants
pub trait ProjectionVisitor<C, R> {
    fn visit_filter(&mut self, projection: &FilterProjection, context: &mut C) -> R;
    fn visit_aggregation(&mut self, projection: &AggregationProjection, context: &mut C) -> R;
    fn visit_group(&mut self, projection: &GroupProjection, context: &mut C) -> R;
    fn visit_topn(&mut self, projection: &TopNProjection, context: &mut C) -> R;
    fn visit_order(&mut self, projection: &OrderProjection, context: &mut C) -> R;
    fn visit_write(&mut self, projection: &WriteProjection, context: &mut C) -> R;
}

impl Projection {
    pub fn projection_type(&self) -> ProjectionType {
        match self {
            Projection::Filter(_) => ProjectionType::Filter,
            Projection::Aggregation(_) => ProjectionType::Aggregation,
            Projection::Group(_) => ProjectionType::Group,
            Projection::TopN(_) => ProjectionType::TopN,
            Projection::Order(_) => ProjectionType::Order,
            Projection::Write(_) => ProjectionType::Write,
        }
    }

    /// Output columns; their count is the arity of the produced rows
    pub fn outputs(&self) -> Vec<Symbol> {
        match self {
            Projection::Filter(p) => p.outputs().to_vec(),
            Projection::Aggregation(p) => p.outputs(),
            Projection::Group(p) => p.outputs(),
            Projection::TopN(p) => p.outputs().to_vec(),
            Projection::Order(p) => p.outputs().to_vec(),
            Projection::Write(p) => p.outputs(),
        }
    }

    pub fn required_granularity(&self) -> RowGranularity {
        match self {
            Projection::Filter(p) => p.required_granularity(),
            Projection::Aggregation(p) => p.required_granularity(),
            Projection::Group(p) => p.required_granularity(),
            Projection::TopN(p) => p.required_granularity(),
            Projection::Order(p) => p.required_granularity(),
            Projection::Write(p) => p.required_granularity(),
        }
    }

    pub fn accept<C, R, V>(&self, visitor: &mut V, context: &mut C) -> R
    where
        V: ProjectionVisitor<C, R>,
    {
        match self {
            Projection::Filter(p) => visitor.visit_filter(p, context),
            Projection::Aggregation(p) => visitor.visit_aggregation(p, context),
            Projection::Group(p) => visitor.visit_group(p, context),
            Projection::TopN(p) => visitor.visit_topn(p, context),
            Projection::Order(p) => visitor.visit_order(p, context),
            Projection::Write(p) => visitor.visit_write(p, context),
        }
    }

    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        out.write_u8(self.projection_type().id());
        match self {
            Projection::Filter(p) => p.write_to(out),
            Projection::Aggregation(p) => p.write_to(out),
            Projection::Group(p) => p.write_to(out),
            Projection::TopN(p) => p.write_to(out),
            Projection::Order(p) => p.write_to(out),
            Projection::Write(p) => p.write_to(out),
        }
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let tag = input.read_u8()?;
        let projection_type = ProjectionType::from_id(tag).ok_or_else(|| {
            EngineError::serialization(format!("unknown projection type {tag}"))
        })?;
        Ok(match projection_type {
            ProjectionType::Filter => Projection::Filter(FilterProjection::read_from(input)?),
            ProjectionType::Aggregation => {
                Projection::Aggregation(AggregationProjection::read_from(input)?)
            }
            ProjectionType::Group => Projection::Group(GroupProjection::read_from(input)?),
            ProjectionType::TopN => Projection::TopN(TopNProjection::read_from(input)?),
            ProjectionType::Order => Projection::Order(OrderProjection::read_from(input)?),
            ProjectionType::Write => Projection::Write(WriteProjection::read_from(input)?),
        })
    }

    pub fn write_all(projections: &[Projection], out: &mut StreamOutput) -> EngineResult<()> {
        out.write_vlong(projections.len() as u64);
        for projection in projections {
            projection.write_to(out)?;
        }
        Ok(())
    }

    pub fn read_all(input: &mut StreamInput<'_>) -> EngineResult<Vec<Projection>> {
        input.read_collection(Projection::read_from)
    }
}

/// Rejects chains whose required granularity decreases along the pipeline
pub fn validate_chain(projections: &[Projection]) -> EngineResult<()> {
    for pair in projections.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        if after.required_granularity() < before.required_granularity() {
            return Err(EngineError::invalid_plan(format!(
                "{} at {} cannot follow {} at {}",
                after.projection_type(),
                after.required_granularity(),
                before.projection_type(),
                before.required_granularity()
            )));
        }
    }
    Ok(())
}

/// Renders one projection per line for `explain`
struct ProjectionFormatter;

fn format_aggregations(aggregations: &[Aggregation]) -> String {
    aggregations
        .iter()
        .map(|a| {
            format!(
                "{}({}) {}->{}",
                a.info.name(),
                SymbolFormatter::format_all(&a.inputs),
                a.from_step,
                a.to_step
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_order_by(order_by: &[OrderBy]) -> String {
    order_by
        .iter()
        .map(|o| {
            let direction = if o.descending { "DESC" } else { "ASC" };
            let nulls = if o.effective_nulls_first() {
                "NULLS FIRST"
            } else {
                "NULLS LAST"
            };
            format!("{} {} {}", SymbolFormatter::format(&o.symbol), direction, nulls)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl<'a> ProjectionVisitor<fmt::Formatter<'a>, fmt::Result> for ProjectionFormatter {
    fn visit_filter(&mut self, p: &FilterProjection, f: &mut fmt::Formatter<'a>) -> fmt::Result {
        write!(
            f,
            "FILTER {} -> [{}]",
            SymbolFormatter::format(p.query()),
            SymbolFormatter::format_all(p.outputs())
        )
    }

    fn visit_aggregation(
        &mut self,
        p: &AggregationProjection,
        f: &mut fmt::Formatter<'a>,
    ) -> fmt::Result {
        write!(f, "AGGREGATION [{}]", format_aggregations(p.aggregations()))
    }

    fn visit_group(&mut self, p: &GroupProjection, f: &mut fmt::Formatter<'a>) -> fmt::Result {
        write!(
            f,
            "GROUP BY [{}] [{}]",
            SymbolFormatter::format_all(p.keys()),
            format_aggregations(p.aggregations())
        )
    }

    fn visit_topn(&mut self, p: &TopNProjection, f: &mut fmt::Formatter<'a>) -> fmt::Result {
        write!(f, "TOPN [{}]", SymbolFormatter::format_all(p.outputs()))?;
        if !p.order_by().is_empty() {
            write!(f, " ORDER BY {}", format_order_by(p.order_by()))?;
        }
        if let Some(limit) = p.limit() {
            write!(f, " LIMIT {limit}")?;
        }
        if p.offset() > 0 {
            write!(f, " OFFSET {}", p.offset())?;
        }
        Ok(())
    }

    fn visit_order(&mut self, p: &OrderProjection, f: &mut fmt::Formatter<'a>) -> fmt::Result {
        write!(
            f,
            "ORDER [{}] BY {}",
            SymbolFormatter::format_all(p.outputs()),
            format_order_by(p.order_by())
        )
    }

    fn visit_write(&mut self, p: &WriteProjection, f: &mut fmt::Formatter<'a>) -> fmt::Result {
        write!(f, "WRITE [{}]", SymbolFormatter::format_all(p.inputs()))
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.accept(&mut ProjectionFormatter, f)?;
        write!(f, " @{}", self.required_granularity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
    use crate::types::DataType;

    fn count_all(from: AggregateStep, to: AggregateStep, granularity: RowGranularity) -> Projection {
        let info = FunctionInfo::new(
            FunctionIdent::new("count", vec![]),
            DataType::Long,
            FunctionKind::Aggregate,
        );
        let inputs = match from {
            AggregateStep::Iter => vec![],
            _ => vec![Symbol::reference(0, DataType::AggregationState)],
        };
        Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(info, inputs, from, to)],
            granularity,
        ))
    }

    #[test]
    fn test_chain_order_validation() {
        let ok = vec![
            count_all(AggregateStep::Iter, AggregateStep::Partial, RowGranularity::Shard),
            count_all(AggregateStep::Partial, AggregateStep::Final, RowGranularity::Cluster),
        ];
        assert!(validate_chain(&ok).is_ok());

        let backwards = vec![
            count_all(AggregateStep::Iter, AggregateStep::Partial, RowGranularity::Cluster),
            count_all(AggregateStep::Partial, AggregateStep::Final, RowGranularity::Shard),
        ];
        assert!(matches!(
            validate_chain(&backwards),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_filter_outputs_only_change_via_setter() {
        let mut filter = FilterProjection::new(
            Symbol::literal(true),
            vec![Symbol::reference(0, DataType::Integer)],
        );
        assert_eq!(filter.required_granularity(), RowGranularity::Cluster);
        filter.set_outputs(vec![
            Symbol::reference(1, DataType::String),
            Symbol::reference(0, DataType::Integer),
        ]);
        assert_eq!(Projection::Filter(filter).outputs().len(), 2);
    }

    #[test]
    fn test_projection_wire_roundtrip() {
        let projections = vec![
            Projection::Filter(
                FilterProjection::new(Symbol::literal(true), vec![Symbol::reference(0, DataType::Long)])
                    .with_granularity(RowGranularity::Shard),
            ),
            count_all(AggregateStep::Iter, AggregateStep::Partial, RowGranularity::Shard),
            Projection::TopN(TopNProjection::new(
                vec![Symbol::reference(0, DataType::Long)],
                vec![OrderBy::desc(Symbol::reference(0, DataType::Long)).with_nulls_first(false)],
                Some(10),
                2,
            )),
            Projection::Write(WriteProjection::new(vec![Symbol::reference(0, DataType::Long)])),
        ];
        let mut out = StreamOutput::new();
        Projection::write_all(&projections, &mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = StreamInput::new(&bytes);
        assert_eq!(Projection::read_all(&mut input).unwrap(), projections);
        assert!(input.is_exhausted());
    }

    #[test]
    fn test_unknown_projection_tag() {
        let mut input = StreamInput::new(&[42]);
        assert!(Projection::read_from(&mut input).is_err());
    }

    #[test]
    fn test_json_plan_shape() {
        let json = r#"{"type":"topn","outputs":[{"symbol":"reference","index":0,"data_type":"long"}],"limit":3}"#;
        let projection: Projection = serde_json::from_str(json).unwrap();
        assert_eq!(projection.projection_type(), ProjectionType::TopN);
        assert_eq!(projection.required_granularity(), RowGranularity::Cluster);
    }

    #[test]
    fn test_explain_line() {
        let line = count_all(AggregateStep::Iter, AggregateStep::Final, RowGranularity::Node).to_string();
        assert_eq!(line, "AGGREGATION [count() iter->final] @NODE");
    }
}
