use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Row, Schema, Value};
use crate::parser::ast::{BinaryOp, Expr};

/// Boolean predicates: AND, OR, NOT and the IS [NOT] NULL test.
///
/// Both binary forms short-circuit, so the right side of `false AND x` is
/// never evaluated.
pub struct LogicalEvaluator;

impl ExpressionEvaluator for LogicalEvaluator {
    fn name(&self) -> &'static str {
        "LOGICAL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        match expr {
            Expr::BinaryOp { op, .. } => op.is_logical(),
            Expr::Not { .. } | Expr::IsNull { .. } => true,
            _ => false,
        }
    }

    fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema, context: &EvaluationContext<'_>) -> Result<Value> {
        match expr {
            Expr::Not { expr } => {
                let val = context.evaluate(expr, row, schema)?;
                if val.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Boolean(!val.as_bool()))
            }
            Expr::IsNull { expr, negated } => {
                let is_null = context.evaluate(expr, row, schema)?.is_null();
                Ok(Value::Boolean(is_null ^ *negated))
            }
            Expr::BinaryOp { left, op: BinaryOp::And, right } => {
                let left_val = context.evaluate(left, row, schema)?;
                if !left_val.as_bool() {
                    return Ok(Value::Boolean(false));
                }
                let right_val = context.evaluate(right, row, schema)?;
                Ok(Value::Boolean(right_val.as_bool()))
            }
            Expr::BinaryOp { left, op: BinaryOp::Or, right } => {
                let left_val = context.evaluate(left, row, schema)?;
                if left_val.as_bool() {
                    return Ok(Value::Boolean(true));
                }
                let right_val = context.evaluate(right, row, schema)?;
                Ok(Value::Boolean(right_val.as_bool()))
            }
            _ => unreachable!(),
        }
    }
}
