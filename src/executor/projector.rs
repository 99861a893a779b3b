//! Projector trait

use super::CancelFlag;
use crate::errors::{EngineError, EngineResult};
use crate::projection::{ProjectionType, RowGranularity};
use crate::row::Bucket;

/// Executable form of a projection: consumes a bucket and produces one
pub trait Projector: Send {
    fn projection_type(&self) -> ProjectionType;

    fn required_granularity(&self) -> RowGranularity;

    /// Transforms the bucket; callers go through [`Projector::execute`]
    fn apply(&mut self, input: Bucket, cancel: &CancelFlag) -> EngineResult<Bucket>;

    /// Runs the projector at `granularity`, refusing levels below its requirement
    fn execute(
        &mut self,
        input: Bucket,
        granularity: RowGranularity,
        cancel: &CancelFlag,
    ) -> EngineResult<Bucket> {
        let required = self.required_granularity();
        if granularity < required {
            return Err(EngineError::GranularityViolation {
                projection: self.projection_type(),
                required,
                actual: granularity,
            });
        }
        cancel.check()?;
        self.apply(input, cancel)
    }
}

impl std::fmt::Debug for dyn Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("projection_type", &self.projection_type())
            .field("required_granularity", &self.required_granularity())
            .finish()
    }
}
