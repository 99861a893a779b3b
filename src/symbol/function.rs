//! Function identity and resolved signature

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Symbol;
use crate::errors::{EngineError, EngineResult};
use crate::stream::{StreamInput, StreamOutput};
use crate::types::DataType;

/// Function name plus argument types; the key of function resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionIdent {
    pub name: String,
    pub argument_types: Vec<DataType>,
}

impl FunctionIdent {
    pub fn new(name: impl Into<String>, argument_types: Vec<DataType>) -> Self {
        Self {
            name: name.into(),
            argument_types,
        }
    }

    pub fn write_to(&self, out: &mut StreamOutput) {
        out.write_string(&self.name);
        out.write_collection(&self.argument_types, |out, t| t.write_to(out));
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let name = input.read_string()?;
        let argument_types = input.read_collection(DataType::read_from)?;
        Ok(Self {
            name,
            argument_types,
        })
    }
}

impl fmt::Display for FunctionIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.argument_types.iter().map(|t| t.name()).collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

/// Whether a function maps rows to values or folds them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

impl FunctionKind {
    fn id(self) -> u8 {
        match self {
            FunctionKind::Scalar => 0,
            FunctionKind::Aggregate => 1,
        }
    }

    fn from_id(id: u8) -> EngineResult<Self> {
        match id {
            0 => Ok(FunctionKind::Scalar),
            1 => Ok(FunctionKind::Aggregate),
            other => Err(EngineError::serialization(format!(
                "unknown function kind {other}"
            ))),
        }
    }
}

/// A resolved function signature as produced by the planner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub ident: FunctionIdent,
    pub return_type: DataType,
    pub kind: FunctionKind,
}

impl FunctionInfo {
    pub fn new(ident: FunctionIdent, return_type: DataType, kind: FunctionKind) -> Self {
        Self {
            ident,
            return_type,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.ident.name
    }

    pub fn write_to(&self, out: &mut StreamOutput) {
        self.ident.write_to(out);
        self.return_type.write_to(out);
        out.write_u8(self.kind.id());
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let ident = FunctionIdent::read_from(input)?;
        let return_type = DataType::read_from(input)?;
        let kind = FunctionKind::from_id(input.read_u8()?)?;
        Ok(Self {
            ident,
            return_type,
            kind,
        })
    }
}

/// A function call node: resolved signature plus argument symbols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    pub info: FunctionInfo,
    pub arguments: Vec<Symbol>,
}

impl Function {
    pub fn new(info: FunctionInfo, arguments: Vec<Symbol>) -> Self {
        Self { info, arguments }
    }

    pub fn return_type(&self) -> DataType {
        self.info.return_type
    }
}
