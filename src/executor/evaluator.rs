//! Symbol compilation and row evaluation

use std::sync::Arc;

use crate::errors::{EngineError, EngineResult};
use crate::functions::{FunctionRegistry, ScalarFunction};
use crate::symbol::{Function, FunctionKind, Symbol, SymbolVisitor};
use crate::types::{DataType, Value};

/// A symbol with its functions resolved, ready to evaluate against rows
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Input(usize),
    Call {
        function: Arc<dyn ScalarFunction>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// Resolves every function in the tree through the registry
    pub fn compile(symbol: &Symbol, registry: &FunctionRegistry) -> EngineResult<Self> {
        symbol.accept(&mut ExpressionCompiler { registry }, &mut ())
    }

    pub fn compile_all(symbols: &[Symbol], registry: &FunctionRegistry) -> EngineResult<Vec<Self>> {
        symbols.iter().map(|s| Self::compile(s, registry)).collect()
    }

    pub fn evaluate(&self, row: &[Value]) -> EngineResult<Value> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Input(index) => row.get(*index).cloned().ok_or_else(|| {
                EngineError::execution(format!(
                    "column {} out of range for a row of {} values",
                    index,
                    row.len()
                ))
            }),
            Expression::Call {
                function,
                arguments,
            } => {
                let args = arguments
                    .iter()
                    .map(|argument| argument.evaluate(row))
                    .collect::<EngineResult<Vec<_>>>()?;
                function.evaluate(&args)
            }
        }
    }

    /// Evaluates each expression against the row, producing a new row
    pub fn project(expressions: &[Expression], row: &[Value]) -> EngineResult<Vec<Value>> {
        expressions.iter().map(|e| e.evaluate(row)).collect()
    }
}

struct ExpressionCompiler<'a> {
    registry: &'a FunctionRegistry,
}

impl SymbolVisitor<(), EngineResult<Expression>> for ExpressionCompiler<'_> {
    fn visit_literal(&mut self, value: &Value, data_type: DataType, _: &mut ()) -> EngineResult<Expression> {
        if !value.fits(data_type) {
            return Err(EngineError::invalid_plan(format!(
                "literal {value} does not fit its declared type {data_type}"
            )));
        }
        Ok(Expression::Literal(value.clone()))
    }

    fn visit_reference(&mut self, index: u32, _: DataType, _: &mut ()) -> EngineResult<Expression> {
        Ok(Expression::Input(index as usize))
    }

    fn visit_function(&mut self, function: &Function, context: &mut ()) -> EngineResult<Expression> {
        if function.info.kind == FunctionKind::Aggregate {
            return Err(EngineError::invalid_plan(format!(
                "aggregate {} used in a scalar context",
                function.info.ident
            )));
        }
        let declared = &function.info.ident.argument_types;
        if declared.len() != function.arguments.len() {
            return Err(EngineError::invalid_plan(format!(
                "{} called with {} arguments",
                function.info.ident,
                function.arguments.len()
            )));
        }
        for (argument, expected) in function.arguments.iter().zip(declared) {
            let actual = argument.value_type();
            if actual != *expected && actual != DataType::Undefined {
                return Err(EngineError::type_resolution(format!(
                    "{} expects {} but argument is {}",
                    function.info.ident, expected, actual
                )));
            }
        }
        let resolved = self.registry.verify_scalar(&function.info)?;
        let arguments = function
            .arguments
            .iter()
            .map(|argument| argument.accept(self, context))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Expression::Call {
            function: resolved,
            arguments,
        })
    }
}
