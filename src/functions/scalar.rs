//! Built-in scalar functions
//!
//! Comparison and boolean operators follow SQL three-valued logic: a null
//! operand yields null, except where AND/OR can decide without it.

use std::cmp::Ordering;
use std::fmt;

use crate::errors::{EngineError, EngineResult};
use crate::symbol::{FunctionIdent, FunctionInfo, FunctionKind};
use crate::types::{DataType, Value};

/// A resolved scalar function
pub trait ScalarFunction: Send + Sync + fmt::Debug {
    fn info(&self) -> &FunctionInfo;

    fn evaluate(&self, args: &[Value]) -> EngineResult<Value>;
}

pub const COMPARISONS: [&str; 6] = ["eq", "neq", "lt", "lte", "gt", "gte"];
pub const ARITHMETIC: [&str; 5] = ["add", "subtract", "multiply", "divide", "modulus"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Compare(CompareOp),
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
    Arithmetic(ArithmeticOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(CompareOp::Eq),
            "neq" => Some(CompareOp::Neq),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Neq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl ArithmeticOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(ArithmeticOp::Add),
            "subtract" => Some(ArithmeticOp::Subtract),
            "multiply" => Some(ArithmeticOp::Multiply),
            "divide" => Some(ArithmeticOp::Divide),
            "modulus" => Some(ArithmeticOp::Modulus),
            _ => None,
        }
    }

    fn apply_long(self, a: i64, b: i64) -> EngineResult<i64> {
        let result = match self {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide | ArithmeticOp::Modulus if b == 0 => {
                return Err(EngineError::execution("division by zero"))
            }
            ArithmeticOp::Divide => a.checked_div(b),
            ArithmeticOp::Modulus => a.checked_rem(b),
        };
        result.ok_or_else(|| EngineError::execution("long overflow in arithmetic"))
    }

    fn apply_double(self, a: f64, b: f64) -> f64 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => a / b,
            ArithmeticOp::Modulus => a % b,
        }
    }
}

/// Scalar operator bound to its resolved signature
#[derive(Debug)]
pub struct BuiltinScalar {
    info: FunctionInfo,
    operator: Operator,
}

fn unsupported(name: &str, argument_types: &[DataType]) -> EngineError {
    EngineError::type_resolution(format!(
        "no scalar function matches {}",
        FunctionIdent::new(name, argument_types.to_vec())
    ))
}

fn is_boolean_like(t: DataType) -> bool {
    matches!(t, DataType::Boolean | DataType::Undefined)
}

/// Whether values of the two types can be ordered against each other
fn comparable_pair(a: DataType, b: DataType) -> bool {
    if a == DataType::Undefined || b == DataType::Undefined {
        return true;
    }
    if !a.is_comparable() || !b.is_comparable() {
        return false;
    }
    a == b || (a.is_numeric() && b.is_numeric())
}

impl BuiltinScalar {
    /// Resolves one of the built-in operators by name and argument types
    pub fn resolve(name: &str, argument_types: &[DataType]) -> EngineResult<Self> {
        let (operator, return_type) = match (name, argument_types) {
            (_, [a, b]) if CompareOp::from_name(name).is_some() => {
                if !comparable_pair(*a, *b) {
                    return Err(unsupported(name, argument_types));
                }
                let op = CompareOp::from_name(name).ok_or_else(|| unsupported(name, argument_types))?;
                (Operator::Compare(op), DataType::Boolean)
            }
            ("and" | "or", [a, b]) if is_boolean_like(*a) && is_boolean_like(*b) => {
                let op = if name == "and" { Operator::And } else { Operator::Or };
                (op, DataType::Boolean)
            }
            ("not", [a]) if is_boolean_like(*a) => (Operator::Not, DataType::Boolean),
            ("is_null", [_]) => (Operator::IsNull, DataType::Boolean),
            ("is_not_null", [_]) => (Operator::IsNotNull, DataType::Boolean),
            (_, [a, b]) if ArithmeticOp::from_name(name).is_some() => {
                if !a.is_numeric() || !b.is_numeric() {
                    return Err(unsupported(name, argument_types));
                }
                let op =
                    ArithmeticOp::from_name(name).ok_or_else(|| unsupported(name, argument_types))?;
                let return_type = if a.is_integral() && b.is_integral() {
                    DataType::Long
                } else {
                    DataType::Double
                };
                (Operator::Arithmetic(op), return_type)
            }
            _ => return Err(unsupported(name, argument_types)),
        };
        Ok(Self {
            info: FunctionInfo::new(
                FunctionIdent::new(name, argument_types.to_vec()),
                return_type,
                FunctionKind::Scalar,
            ),
            operator,
        })
    }

    fn compare(&self, op: CompareOp, a: &Value, b: &Value) -> EngineResult<Value> {
        if a.is_null() || b.is_null() {
            return Ok(Value::Null);
        }
        let ordering = a.compare(b).ok_or_else(|| {
            EngineError::execution(format!(
                "{} cannot compare {} with {}",
                self.info.name(),
                a.data_type(),
                b.data_type()
            ))
        })?;
        Ok(Value::Boolean(op.holds(ordering)))
    }

    fn boolean(&self, value: &Value) -> EngineResult<Option<bool>> {
        match value {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(*b)),
            other => Err(EngineError::execution(format!(
                "{} expected a boolean operand, got {}",
                self.info.name(),
                other.data_type()
            ))),
        }
    }

    fn arithmetic(&self, op: ArithmeticOp, a: &Value, b: &Value) -> EngineResult<Value> {
        if a.is_null() || b.is_null() {
            return Ok(Value::Null);
        }
        let operand_error = || {
            EngineError::execution(format!(
                "{} expected numeric operands, got {} and {}",
                self.info.name(),
                a.data_type(),
                b.data_type()
            ))
        };
        if self.info.return_type == DataType::Long {
            let (x, y) = (a.as_i64().ok_or_else(operand_error)?, b.as_i64().ok_or_else(operand_error)?);
            op.apply_long(x, y).map(Value::Long)
        } else {
            let (x, y) = (a.as_f64().ok_or_else(operand_error)?, b.as_f64().ok_or_else(operand_error)?);
            Ok(Value::Double(op.apply_double(x, y)))
        }
    }
}

impl ScalarFunction for BuiltinScalar {
    fn info(&self) -> &FunctionInfo {
        &self.info
    }

    fn evaluate(&self, args: &[Value]) -> EngineResult<Value> {
        let arity = self.info.ident.argument_types.len();
        if args.len() != arity {
            return Err(EngineError::execution(format!(
                "{} expects {} arguments, got {}",
                self.info.name(),
                arity,
                args.len()
            )));
        }
        match self.operator {
            Operator::Compare(op) => self.compare(op, &args[0], &args[1]),
            Operator::And => {
                let (a, b) = (self.boolean(&args[0])?, self.boolean(&args[1])?);
                Ok(match (a, b) {
                    (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            Operator::Or => {
                let (a, b) = (self.boolean(&args[0])?, self.boolean(&args[1])?);
                Ok(match (a, b) {
                    (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            Operator::Not => Ok(Value::from(self.boolean(&args[0])?.map(|b| !b))),
            Operator::IsNull => Ok(Value::Boolean(args[0].is_null())),
            Operator::IsNotNull => Ok(Value::Boolean(!args[0].is_null())),
            Operator::Arithmetic(op) => self.arithmetic(op, &args[0], &args[1]),
        }
    }
}
