//! # Function Registry
//!
//! Maps a function name and argument types to an implementation. All type
//! resolution failures originate here, before any row is processed.

use std::collections::HashMap;
use std::sync::Arc;

use super::scalar::{BuiltinScalar, ScalarFunction, ARITHMETIC, COMPARISONS};
use crate::aggregation::{
    AggregateFunction, AverageAggregation, CountAggregation, ExtremeAggregation, ExtremeKind,
    SumAggregation, VarianceAggregation,
};
use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::DataType;

/// Builds a scalar implementation for a name and argument types
pub type ScalarResolver = fn(&str, &[DataType]) -> EngineResult<Arc<dyn ScalarFunction>>;

/// Builds an aggregate implementation for argument types
pub type AggregateResolver = fn(&[DataType]) -> EngineResult<Arc<dyn AggregateFunction>>;

/// Registry of scalar and aggregate functions
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    scalars: HashMap<String, ScalarResolver>,
    aggregates: HashMap<String, AggregateResolver>,
}

fn builtin_scalar(name: &str, types: &[DataType]) -> EngineResult<Arc<dyn ScalarFunction>> {
    Ok(Arc::new(BuiltinScalar::resolve(name, types)?))
}

impl FunctionRegistry {
    /// Registry with every built-in function
    pub fn new() -> Self {
        let mut registry = Self::default();
        for name in COMPARISONS.iter().chain(ARITHMETIC.iter()) {
            registry.register_scalar(name, builtin_scalar);
        }
        for name in ["and", "or", "not", "is_null", "is_not_null"] {
            registry.register_scalar(name, builtin_scalar);
        }

        registry.register_aggregate("count", |types| {
            Ok(Arc::new(CountAggregation::resolve(types)?))
        });
        registry.register_aggregate("sum", |types| Ok(Arc::new(SumAggregation::resolve(types)?)));
        registry.register_aggregate("avg", |types| {
            Ok(Arc::new(AverageAggregation::resolve(types)?))
        });
        registry.register_aggregate("min", |types| {
            Ok(Arc::new(ExtremeAggregation::resolve(ExtremeKind::Min, types)?))
        });
        registry.register_aggregate("max", |types| {
            Ok(Arc::new(ExtremeAggregation::resolve(ExtremeKind::Max, types)?))
        });
        registry.register_aggregate("variance", |types| {
            Ok(Arc::new(VarianceAggregation::resolve_variance(types)?))
        });
        registry.register_aggregate("stddev", |types| {
            Ok(Arc::new(VarianceAggregation::resolve_stddev(types)?))
        });
        registry
    }

    pub fn register_scalar(&mut self, name: &str, resolver: ScalarResolver) {
        self.scalars.insert(name.to_lowercase(), resolver);
    }

    pub fn register_aggregate(&mut self, name: &str, resolver: AggregateResolver) {
        self.aggregates.insert(name.to_lowercase(), resolver);
    }

    /// Resolves a scalar function by signature
    pub fn resolve_scalar(&self, ident: &FunctionIdent) -> EngineResult<Arc<dyn ScalarFunction>> {
        let name = ident.name.to_lowercase();
        let resolver = self.scalars.get(&name).ok_or_else(|| {
            EngineError::type_resolution(format!("unknown scalar function {}", ident.name))
        })?;
        resolver(&name, &ident.argument_types)
    }

    /// Resolves an aggregate function by signature
    pub fn resolve_aggregate(
        &self,
        ident: &FunctionIdent,
    ) -> EngineResult<Arc<dyn AggregateFunction>> {
        let resolver = self
            .aggregates
            .get(&ident.name.to_lowercase())
            .ok_or_else(|| {
                EngineError::type_resolution(format!("unknown aggregate function {}", ident.name))
            })?;
        resolver(&ident.argument_types)
    }

    /// Resolves a planner-supplied scalar signature, checking its declared return type
    pub fn verify_scalar(&self, info: &FunctionInfo) -> EngineResult<Arc<dyn ScalarFunction>> {
        expect_kind(info, FunctionKind::Scalar)?;
        let function = self.resolve_scalar(&info.ident)?;
        expect_return_type(info, function.info().return_type)?;
        Ok(function)
    }

    /// Resolves a planner-supplied aggregate signature, checking its declared return type
    pub fn verify_aggregate(&self, info: &FunctionInfo) -> EngineResult<Arc<dyn AggregateFunction>> {
        expect_kind(info, FunctionKind::Aggregate)?;
        let function = self.resolve_aggregate(&info.ident)?;
        expect_return_type(info, function.info().return_type)?;
        Ok(function)
    }

    /// Resolved signature of a scalar call, for building plans
    pub fn scalar_info(&self, name: &str, argument_types: &[DataType]) -> EngineResult<FunctionInfo> {
        let ident = FunctionIdent::new(name, argument_types.to_vec());
        Ok(self.resolve_scalar(&ident)?.info().clone())
    }

    /// Resolved signature of an aggregate call, for building plans
    pub fn aggregate_info(
        &self,
        name: &str,
        argument_types: &[DataType],
    ) -> EngineResult<FunctionInfo> {
        let ident = FunctionIdent::new(name, argument_types.to_vec());
        Ok(self.resolve_aggregate(&ident)?.info().clone())
    }
}

fn expect_kind(info: &FunctionInfo, kind: FunctionKind) -> EngineResult<()> {
    if info.kind == kind {
        Ok(())
    } else {
        Err(EngineError::type_resolution(format!(
            "{} is declared as {:?} but used as {:?}",
            info.ident, info.kind, kind
        )))
    }
}

fn expect_return_type(info: &FunctionInfo, resolved: DataType) -> EngineResult<()> {
    if info.return_type == resolved {
        Ok(())
    } else {
        Err(EngineError::type_resolution(format!(
            "{} declares return type {} but resolves to {}",
            info.ident, info.return_type, resolved
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = FunctionRegistry::new();
        let info = registry
            .aggregate_info("variance", &[DataType::Timestamp])
            .unwrap();
        assert_eq!(info.return_type, DataType::Double);
        assert_eq!(info.kind, FunctionKind::Aggregate);

        let gt = registry
            .scalar_info("GT", &[DataType::Long, DataType::Integer])
            .unwrap();
        assert_eq!(gt.return_type, DataType::Boolean);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.aggregate_info("median", &[DataType::Double]).unwrap_err();
        assert!(matches!(err, EngineError::TypeResolution(_)));
    }

    #[test]
    fn test_declared_return_type_is_checked() {
        let registry = FunctionRegistry::new();
        let lying = FunctionInfo::new(
            FunctionIdent::new("sum", vec![DataType::Integer]),
            DataType::Double,
            FunctionKind::Aggregate,
        );
        assert!(matches!(
            registry.verify_aggregate(&lying),
            Err(EngineError::TypeResolution(_))
        ));
    }

    #[test]
    fn test_kind_is_checked() {
        let registry = FunctionRegistry::new();
        let info = registry.aggregate_info("count", &[]).unwrap();
        assert!(registry.verify_scalar(&info).is_err());
    }

    #[test]
    fn test_variance_of_string_is_type_error() {
        let registry = FunctionRegistry::new();
        let err = registry
            .aggregate_info("variance", &[DataType::String])
            .unwrap_err();
        assert_eq!(err.code().code(), "GRID_TYPE_RESOLUTION");
    }
}
