//! Typed expression tree
//!
//! Symbols are the language of filters, projection outputs and aggregate
//! arguments. A tree is immutable once built, compares structurally, and
//! round-trips through the binary stream format. Function symbols carry
//! their resolved return type so decoding never needs the function catalog.

mod function;
mod symbol;
mod visitor;

pub use function::{Function, FunctionIdent, FunctionInfo, FunctionKind};
pub use symbol::{Symbol, MAX_SYMBOL_DEPTH};
pub use visitor::{SymbolFormatter, SymbolVisitor};
