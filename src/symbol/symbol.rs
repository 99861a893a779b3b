//! Symbol variants and their binary form

use serde::{Deserialize, Serialize};

use super::function::{Function, FunctionInfo};
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::types::{DataType, Value};

/// Nesting bound enforced when decoding untrusted bytes
pub const MAX_SYMBOL_DEPTH: usize = 64;

const LITERAL_TAG: u8 = 0;
const REFERENCE_TAG: u8 = 1;
const FUNCTION_TAG: u8 = 2;

/// Expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "symbol", rename_all = "snake_case")]
pub enum Symbol {
    /// Constant value with its declared type
    Literal { value: Value, data_type: DataType },
    /// Column of the input row, by position
    Reference { index: u32, data_type: DataType },
    /// Call of a resolved scalar or aggregate function
    Function(Function),
}

impl Symbol {
    /// Literal typed after its value; NULL becomes `Undefined`
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        Symbol::Literal {
            data_type: value.data_type(),
            value,
        }
    }

    /// Literal with an explicit type, e.g. a typed NULL
    pub fn typed_literal(value: Value, data_type: DataType) -> Self {
        Symbol::Literal { value, data_type }
    }

    pub fn reference(index: u32, data_type: DataType) -> Self {
        Symbol::Reference { index, data_type }
    }

    pub fn function(info: FunctionInfo, arguments: Vec<Symbol>) -> Self {
        Symbol::Function(Function::new(info, arguments))
    }

    /// Type of the value this symbol evaluates to
    pub fn value_type(&self) -> DataType {
        match self {
            Symbol::Literal { data_type, .. } | Symbol::Reference { data_type, .. } => *data_type,
            Symbol::Function(function) => function.return_type(),
        }
    }

    /// Highest input column referenced anywhere in the tree
    pub fn max_reference(&self) -> Option<u32> {
        match self {
            Symbol::Literal { .. } => None,
            Symbol::Reference { index, .. } => Some(*index),
            Symbol::Function(function) => function
                .arguments
                .iter()
                .filter_map(Symbol::max_reference)
                .max(),
        }
    }

    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        match self {
            Symbol::Literal { value, data_type } => {
                out.write_u8(LITERAL_TAG);
                data_type.write_to(out);
                data_type.streamer().write(value, out)
            }
            Symbol::Reference { index, data_type } => {
                out.write_u8(REFERENCE_TAG);
                out.write_vint(*index);
                data_type.write_to(out);
                Ok(())
            }
            Symbol::Function(function) => {
                out.write_u8(FUNCTION_TAG);
                function.info.write_to(out);
                out.write_vlong(function.arguments.len() as u64);
                for argument in &function.arguments {
                    argument.write_to(out)?;
                }
                Ok(())
            }
        }
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Self::read_nested(input, 0)
    }

    fn read_nested(input: &mut StreamInput<'_>, depth: usize) -> EngineResult<Self> {
        if depth >= MAX_SYMBOL_DEPTH {
            return Err(EngineError::serialization(format!(
                "symbol nesting exceeds {MAX_SYMBOL_DEPTH} levels"
            )));
        }
        match input.read_u8()? {
            LITERAL_TAG => {
                let data_type = DataType::read_from(input)?;
                let value = data_type.streamer().read(input)?;
                Ok(Symbol::Literal { value, data_type })
            }
            REFERENCE_TAG => {
                let index = input.read_vint()?;
                let data_type = DataType::read_from(input)?;
                Ok(Symbol::Reference { index, data_type })
            }
            FUNCTION_TAG => {
                let info = FunctionInfo::read_from(input)?;
                let arguments =
                    input.read_collection(|input| Self::read_nested(input, depth + 1))?;
                Ok(Symbol::function(info, arguments))
            }
            tag => Err(EngineError::serialization(format!(
                "unknown symbol discriminator {tag}"
            ))),
        }
    }

    /// Writes a length-prefixed list of symbols
    pub fn write_all(symbols: &[Symbol], out: &mut StreamOutput) -> EngineResult<()> {
        out.write_vlong(symbols.len() as u64);
        for symbol in symbols {
            symbol.write_to(out)?;
        }
        Ok(())
    }

    /// Reads a list written by [`Symbol::write_all`]
    pub fn read_all(input: &mut StreamInput<'_>) -> EngineResult<Vec<Symbol>> {
        input.read_collection(Symbol::read_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FunctionIdent, FunctionKind};

    fn gt_info() -> FunctionInfo {
        FunctionInfo::new(
            FunctionIdent::new("gt", vec![DataType::Integer, DataType::Integer]),
            DataType::Boolean,
            FunctionKind::Scalar,
        )
    }

    #[test]
    fn test_value_type() {
        assert_eq!(Symbol::literal(1i32).value_type(), DataType::Integer);
        assert_eq!(
            Symbol::reference(3, DataType::String).value_type(),
            DataType::String
        );
        let call = Symbol::function(
            gt_info(),
            vec![Symbol::reference(0, DataType::Integer), Symbol::literal(5i32)],
        );
        assert_eq!(call.value_type(), DataType::Boolean);
    }

    #[test]
    fn test_max_reference() {
        let call = Symbol::function(
            gt_info(),
            vec![Symbol::reference(4, DataType::Integer), Symbol::reference(2, DataType::Integer)],
        );
        assert_eq!(call.max_reference(), Some(4));
        assert_eq!(Symbol::literal(1i32).max_reference(), None);
    }

    #[test]
    fn test_unknown_discriminator() {
        let mut input = StreamInput::new(&[9]);
        assert!(matches!(
            Symbol::read_from(&mut input),
            Err(EngineError::Serialization(_))
        ));
    }

    #[test]
    fn test_depth_bound() {
        let mut symbol = Symbol::literal(true);
        let not_info = FunctionInfo::new(
            FunctionIdent::new("not", vec![DataType::Boolean]),
            DataType::Boolean,
            FunctionKind::Scalar,
        );
        for _ in 0..MAX_SYMBOL_DEPTH + 1 {
            symbol = Symbol::function(not_info.clone(), vec![symbol]);
        }
        let mut out = StreamOutput::new();
        symbol.write_to(&mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = StreamInput::new(&bytes);
        assert!(Symbol::read_from(&mut input).is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = Symbol::function(gt_info(), vec![Symbol::literal(1i32), Symbol::literal(2i32)]);
        let b = Symbol::function(gt_info(), vec![Symbol::literal(1i32), Symbol::literal(2i32)]);
        assert_eq!(a, b);
        let c = Symbol::function(gt_info(), vec![Symbol::literal(2i32), Symbol::literal(1i32)]);
        assert_ne!(a, c);
    }
}
