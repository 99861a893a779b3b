//! Visitor dispatch over symbol variants

use super::{Function, Symbol};
use crate::types::{DataType, Value};

/// Exhaustive dispatch over the closed set of symbol variants
pub trait SymbolVisitor<C, R> {
    fn visit_literal(&mut self, value: &Value, data_type: DataType, context: &mut C) -> R;

    fn visit_reference(&mut self, index: u32, data_type: DataType, context: &mut C) -> R;

    fn visit_function(&mut self, function: &Function, context: &mut C) -> R;
}

impl Symbol {
    pub fn accept<C, R, V>(&self, visitor: &mut V, context: &mut C) -> R
    where
        V: SymbolVisitor<C, R>,
    {
        match self {
            Symbol::Literal { value, data_type } => visitor.visit_literal(value, *data_type, context),
            Symbol::Reference { index, data_type } => {
                visitor.visit_reference(*index, *data_type, context)
            }
            Symbol::Function(function) => visitor.visit_function(function, context),
        }
    }
}

/// Renders symbols as compact text, e.g. `gt(in(0), 5)`
#[derive(Debug, Default)]
pub struct SymbolFormatter;

impl SymbolFormatter {
    pub fn format(symbol: &Symbol) -> String {
        let mut out = String::new();
        symbol.accept(&mut SymbolFormatter, &mut out);
        out
    }

    pub fn format_all(symbols: &[Symbol]) -> String {
        symbols
            .iter()
            .map(Self::format)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl SymbolVisitor<String, ()> for SymbolFormatter {
    fn visit_literal(&mut self, value: &Value, _data_type: DataType, out: &mut String) {
        out.push_str(&value.to_string());
    }

    fn visit_reference(&mut self, index: u32, _data_type: DataType, out: &mut String) {
        out.push_str(&format!("in({index})"));
    }

    fn visit_function(&mut self, function: &Function, out: &mut String) {
        out.push_str(function.info.name());
        out.push('(');
        for (i, argument) in function.arguments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            argument.accept(self, out);
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};

    #[test]
    fn test_format_nested() {
        let info = FunctionInfo::new(
            FunctionIdent::new("gt", vec![DataType::Integer, DataType::Integer]),
            DataType::Boolean,
            FunctionKind::Scalar,
        );
        let symbol = Symbol::function(
            info,
            vec![Symbol::reference(0, DataType::Integer), Symbol::literal(5i32)],
        );
        assert_eq!(SymbolFormatter::format(&symbol), "gt(in(0), 5)");
    }

    #[test]
    fn test_format_string_literal() {
        assert_eq!(SymbolFormatter::format(&Symbol::literal("ab")), "'ab'");
    }
}
