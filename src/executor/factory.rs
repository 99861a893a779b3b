//! Projection to projector translation
//!
//! All type resolution for a chain happens here, before any row flows.

use std::sync::Arc;

use super::aggregation::{AggregationProjector, Aggregator};
use super::filter::FilterProjector;
use super::group::GroupProjector;
use super::order::OrderProjector;
use super::sorter::{RowSorter, SortKey};
use super::topn::TopNProjector;
use super::write::{RowSink, WriteProjector};
use super::{Expression, Projector};
use crate::errors::{EngineError, EngineResult};
use crate::functions::FunctionRegistry;
use crate::projection::{
    AggregateStep, Aggregation, AggregationProjection, FilterProjection, GroupProjection,
    OrderBy, OrderProjection, Projection, ProjectionVisitor, TopNProjection, WriteProjection,
};
use crate::types::DataType;

/// Builds projectors; collaborators are passed in explicitly
#[derive(Debug, Clone)]
pub struct ProjectorFactory {
    registry: Arc<FunctionRegistry>,
    sink: Option<Arc<dyn RowSink>>,
}

impl ProjectorFactory {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            sink: None,
        }
    }

    /// Sink used by Write projections
    pub fn with_sink(mut self, sink: Arc<dyn RowSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn create(&self, projection: &Projection) -> EngineResult<Box<dyn Projector>> {
        projection.accept(&mut Builder { factory: self }, &mut ())
    }

    fn compile_aggregations(&self, aggregations: &[Aggregation]) -> EngineResult<Vec<Aggregator>> {
        aggregations
            .iter()
            .map(|aggregation| {
                aggregation.validate()?;
                if aggregation.from_step == AggregateStep::Partial
                    && aggregation
                        .inputs
                        .iter()
                        .any(|input| input.value_type() != DataType::AggregationState)
                {
                    return Err(EngineError::invalid_plan(format!(
                        "{} merges partial states but its input is not a state column",
                        aggregation.info.name()
                    )));
                }
                if aggregation.from_step == AggregateStep::Iter {
                    check_raw_inputs(aggregation)?;
                }
                let function = self.registry.verify_aggregate(&aggregation.info)?;
                let inputs = Expression::compile_all(&aggregation.inputs, &self.registry)?;
                Ok(Aggregator::new(
                    function,
                    inputs,
                    aggregation.from_step,
                    aggregation.to_step,
                ))
            })
            .collect()
    }

    fn compile_sorter(&self, order_by: &[OrderBy]) -> EngineResult<RowSorter> {
        let keys = order_by
            .iter()
            .map(|key| {
                let data_type = key.symbol.value_type();
                if !data_type.is_comparable() {
                    return Err(EngineError::type_resolution(format!(
                        "cannot order by a {data_type} column"
                    )));
                }
                Ok(SortKey {
                    expression: Expression::compile(&key.symbol, &self.registry)?,
                    descending: key.descending,
                    nulls_first: key.effective_nulls_first(),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(RowSorter::new(keys))
    }
}

/// Raw inputs must match the declared argument types; undefined inputs
/// (untyped nulls) fit any argument
fn check_raw_inputs(aggregation: &Aggregation) -> EngineResult<()> {
    let declared = &aggregation.info.ident.argument_types;
    if aggregation.inputs.len() != declared.len() {
        return Err(EngineError::type_resolution(format!(
            "{} declares {} arguments but receives {} inputs",
            aggregation.info.name(),
            declared.len(),
            aggregation.inputs.len()
        )));
    }
    for (position, (input, expected)) in aggregation.inputs.iter().zip(declared).enumerate() {
        let actual = input.value_type();
        if actual != *expected && actual != DataType::Undefined {
            return Err(EngineError::type_resolution(format!(
                "{} argument {position} is declared {expected} but receives {actual}",
                aggregation.info.name()
            )));
        }
    }
    Ok(())
}

struct Builder<'a> {
    factory: &'a ProjectorFactory,
}

type Built = EngineResult<Box<dyn Projector>>;

impl ProjectionVisitor<(), Built> for Builder<'_> {
    fn visit_filter(&mut self, p: &FilterProjection, _: &mut ()) -> Built {
        let registry = &self.factory.registry;
        let query_type = p.query().value_type();
        if !matches!(query_type, DataType::Boolean | DataType::Undefined) {
            return Err(EngineError::invalid_plan(format!(
                "filter query has type {query_type}, expected boolean"
            )));
        }
        Ok(Box::new(FilterProjector::new(
            Expression::compile(p.query(), registry)?,
            Expression::compile_all(p.outputs(), registry)?,
            p.required_granularity(),
        )))
    }

    fn visit_aggregation(&mut self, p: &AggregationProjection, _: &mut ()) -> Built {
        Ok(Box::new(AggregationProjector::new(
            self.factory.compile_aggregations(p.aggregations())?,
            p.required_granularity(),
        )))
    }

    fn visit_group(&mut self, p: &GroupProjection, _: &mut ()) -> Built {
        Ok(Box::new(GroupProjector::new(
            Expression::compile_all(p.keys(), &self.factory.registry)?,
            self.factory.compile_aggregations(p.aggregations())?,
            p.required_granularity(),
        )))
    }

    fn visit_topn(&mut self, p: &TopNProjection, _: &mut ()) -> Built {
        let limit = p
            .limit()
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX));
        let offset = usize::try_from(p.offset()).unwrap_or(usize::MAX);
        Ok(Box::new(TopNProjector::new(
            Expression::compile_all(p.outputs(), &self.factory.registry)?,
            self.factory.compile_sorter(p.order_by())?,
            limit,
            offset,
            p.required_granularity(),
        )))
    }

    fn visit_order(&mut self, p: &OrderProjection, _: &mut ()) -> Built {
        if p.order_by().is_empty() {
            return Err(EngineError::invalid_plan("order projection without sort keys"));
        }
        Ok(Box::new(OrderProjector::new(
            Expression::compile_all(p.outputs(), &self.factory.registry)?,
            self.factory.compile_sorter(p.order_by())?,
            p.required_granularity(),
        )))
    }

    fn visit_write(&mut self, p: &WriteProjection, _: &mut ()) -> Built {
        let sink = self
            .factory
            .sink
            .clone()
            .ok_or_else(|| EngineError::invalid_plan("write projection requires a row sink"))?;
        Ok(Box::new(WriteProjector::new(
            Expression::compile_all(p.inputs(), &self.factory.registry)?,
            sink,
            p.required_granularity(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::RowGranularity;
    use crate::symbol::Symbol;

    fn factory() -> ProjectorFactory {
        ProjectorFactory::new(Arc::new(FunctionRegistry::new()))
    }

    #[test]
    fn test_variance_of_string_rejected_at_build() {
        let factory = factory();
        let info = crate::symbol::FunctionInfo::new(
            crate::symbol::FunctionIdent::new("variance", vec![DataType::String]),
            DataType::Double,
            crate::symbol::FunctionKind::Aggregate,
        );
        let projection = Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(
                info,
                vec![Symbol::reference(0, DataType::String)],
                AggregateStep::Iter,
                AggregateStep::Final,
            )],
            RowGranularity::Cluster,
        ));
        let err = factory.create(&projection).unwrap_err();
        assert!(matches!(err, EngineError::TypeResolution(_)));
    }

    fn variance_of(input: Symbol) -> Projection {
        let info = crate::symbol::FunctionInfo::new(
            crate::symbol::FunctionIdent::new("variance", vec![DataType::Integer]),
            DataType::Double,
            crate::symbol::FunctionKind::Aggregate,
        );
        Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(info, vec![input], AggregateStep::Iter, AggregateStep::Final)],
            RowGranularity::Cluster,
        ))
    }

    #[test]
    fn test_raw_input_must_match_declared_argument() {
        let factory = factory();
        let err = factory
            .create(&variance_of(Symbol::reference(0, DataType::String)))
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeResolution(_)));

        assert!(factory
            .create(&variance_of(Symbol::reference(0, DataType::Integer)))
            .is_ok());
        assert!(factory
            .create(&variance_of(Symbol::reference(0, DataType::Undefined)))
            .is_ok());
    }

    #[test]
    fn test_raw_input_count_must_match_declared_arguments() {
        let info = crate::symbol::FunctionInfo::new(
            crate::symbol::FunctionIdent::new("count", vec![]),
            DataType::Long,
            crate::symbol::FunctionKind::Aggregate,
        );
        let projection = Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(
                info,
                vec![Symbol::reference(0, DataType::Long)],
                AggregateStep::Iter,
                AggregateStep::Final,
            )],
            RowGranularity::Cluster,
        ));
        assert!(matches!(
            factory().create(&projection),
            Err(EngineError::TypeResolution(_))
        ));
    }

    #[test]
    fn test_write_without_sink_is_invalid() {
        let projection = Projection::Write(WriteProjection::new(vec![]));
        assert!(matches!(
            factory().create(&projection),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_non_boolean_filter_query_is_invalid() {
        let projection = Projection::Filter(FilterProjection::new(Symbol::literal(1i32), vec![]));
        assert!(matches!(
            factory().create(&projection),
            Err(EngineError::InvalidPlan(_))
        ));
    }
}
