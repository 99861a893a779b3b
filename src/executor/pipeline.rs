//! Projector chains

use super::{CancelFlag, Projector, ProjectorFactory};
use crate::errors::EngineResult;
use crate::projection::{validate_chain, Projection, RowGranularity};
use crate::row::Bucket;

/// Ordered projectors run over one bucket
pub struct ProjectorChain {
    projectors: Vec<Box<dyn Projector>>,
}

impl ProjectorChain {
    /// Validates granularity order, then builds every projector
    pub fn build(projections: &[Projection], factory: &ProjectorFactory) -> EngineResult<Self> {
        validate_chain(projections)?;
        let projectors = projections
            .iter()
            .map(|p| factory.create(p))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { projectors })
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }

    /// Runs the input through every projector at `granularity`
    pub fn run(
        &mut self,
        input: Bucket,
        granularity: RowGranularity,
        cancel: &CancelFlag,
    ) -> EngineResult<Bucket> {
        let mut bucket = input;
        for projector in &mut self.projectors {
            bucket = projector.execute(bucket, granularity, cancel)?;
        }
        Ok(bucket)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::EngineError;
    use crate::functions::FunctionRegistry;
    use crate::projection::{FilterProjection, ProjectionType};
    use crate::symbol::Symbol;
    use crate::types::{DataType, Value};

    fn factory() -> ProjectorFactory {
        ProjectorFactory::new(Arc::new(FunctionRegistry::new()))
    }

    fn pass_all() -> Projection {
        Projection::Filter(FilterProjection::new(
            Symbol::literal(true),
            vec![Symbol::reference(0, DataType::Integer)],
        ))
    }

    #[test]
    fn test_cluster_filter_rejected_at_shard() {
        let mut chain = ProjectorChain::build(&[pass_all()], &factory()).unwrap();
        let err = chain
            .run(Bucket::empty(), RowGranularity::Shard, &CancelFlag::new())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::GranularityViolation {
                projection: ProjectionType::Filter,
                required: RowGranularity::Cluster,
                actual: RowGranularity::Shard,
            }
        );
    }

    #[test]
    fn test_cancelled_chain() {
        let mut chain = ProjectorChain::build(&[pass_all()], &factory()).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let input = Bucket::materialized(vec![vec![Value::Integer(1)]]);
        assert_eq!(
            chain.run(input, RowGranularity::Cluster, &cancel).unwrap_err(),
            EngineError::Cancelled
        );
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let mut chain = ProjectorChain::build(&[], &factory()).unwrap();
        assert!(chain.is_empty());
        let input = Bucket::materialized(vec![vec![Value::Integer(7)]]);
        let out = chain
            .run(input, RowGranularity::Shard, &CancelFlag::new())
            .unwrap();
        assert_eq!(out.into_rows().unwrap(), vec![vec![Value::Integer(7)]]);
    }
}

impl std::fmt::Debug for ProjectorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectorChain")
            .field("projectors", &self.projectors.len())
            .finish()
    }
}
