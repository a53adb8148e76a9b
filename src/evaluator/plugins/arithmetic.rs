use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::parser::ast::{BinaryOp, Expr};

pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn name(&self) -> &'static str {
        "ARITHMETIC"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        match expr {
            Expr::BinaryOp { op, .. } => op.is_arithmetic(),
            Expr::Negate { .. } => true,
            _ => false,
        }
    }

    fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema, context: &EvaluationContext<'_>) -> Result<Value> {
        match expr {
            Expr::Negate { expr } => match context.evaluate(expr, row, schema)? {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => i
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| DbError::ExecutionError("Integer overflow".into())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(DbError::TypeMismatch(format!(
                    "Cannot negate {}",
                    other.type_name()
                ))),
            },
            Expr::BinaryOp { left, op, right } => {
                let left_val = context.evaluate(left, row, schema)?;
                let right_val = context.evaluate(right, row, schema)?;
                apply(*op, left_val, right_val)
            }
            _ => unreachable!(),
        }
    }
}

fn apply(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),

        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => {
                    if b == 0 {
                        return Err(DbError::ExecutionError("Division by zero".into()));
                    }
                    a.checked_div(b)
                }
                BinaryOp::Modulo => {
                    if b == 0 {
                        return Err(DbError::ExecutionError("Modulo by zero".into()));
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!(),
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| DbError::ExecutionError("Integer overflow".into()))
        }

        // Mixed Integer/Float arithmetic always yields Float
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                let result = match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Subtract => x - y,
                    BinaryOp::Multiply => x * y,
                    BinaryOp::Divide => x / y,
                    BinaryOp::Modulo => x % y,
                    _ => unreachable!(),
                };
                Ok(Value::Float(result))
            }
            _ => Err(DbError::TypeMismatch(format!(
                "Arithmetic requires numeric types, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(apply(BinaryOp::Add, Value::Integer(2), Value::Integer(3)).unwrap(), Value::Integer(5));
        assert_eq!(apply(BinaryOp::Modulo, Value::Integer(7), Value::Integer(4)).unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_mixed_yields_float() {
        assert!(matches!(
            apply(BinaryOp::Multiply, Value::Integer(2), Value::Float(1.5)).unwrap(),
            Value::Float(f) if f == 3.0
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            apply(BinaryOp::Divide, Value::Integer(1), Value::Integer(0)),
            Err(DbError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(apply(BinaryOp::Add, Value::Integer(i64::MAX), Value::Integer(1)).is_err());
    }

    #[test]
    fn test_text_is_rejected() {
        assert!(matches!(
            apply(BinaryOp::Add, Value::from("a"), Value::Integer(1)),
            Err(DbError::TypeMismatch(_))
        ));
    }
}
