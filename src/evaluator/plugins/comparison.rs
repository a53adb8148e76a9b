use std::cmp::Ordering;
use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Row, Schema, Value};
use crate::parser::ast::{BinaryOp, Expr};

pub struct ComparisonEvaluator;

impl ExpressionEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::BinaryOp { op, .. } if op.is_comparison())
    }

    fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::BinaryOp { left, op, right } = expr else {
            unreachable!();
        };

        let left_val = context.evaluate(left, row, schema)?;
        let right_val = context.evaluate(right, row, schema)?;

        // NULL compares as unknown, which filters like false
        if left_val.is_null() || right_val.is_null() {
            return Ok(Value::Null);
        }

        let ordering = left_val.compare(&right_val)?;
        Ok(Value::Boolean(ComparisonEvaluator::holds(*op, ordering)))
    }
}

impl ComparisonEvaluator {
    fn holds(op: BinaryOp, ordering: Ordering) -> bool {
        match op {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::NotEq => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::LtEq => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::GtEq => ordering != Ordering::Less,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluatorRegistry;

    fn eval(left: Value, op: BinaryOp, right: Value) -> Result<Value> {
        let registry = EvaluatorRegistry::default();
        let ctx = EvaluationContext::new(&registry, "t");
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(left)),
            op,
            right: Box::new(Expr::Literal(right)),
        };
        ctx.evaluate(&expr, &vec![], &Schema::default())
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        assert_eq!(eval(Value::Integer(2), BinaryOp::Lt, Value::Float(2.5)).unwrap(), Value::Boolean(true));
        assert_eq!(eval(Value::Float(3.0), BinaryOp::Eq, Value::Integer(3)).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_text_comparison() {
        assert_eq!(
            eval(Value::from("abc"), BinaryOp::GtEq, Value::from("abd")).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_null_is_unknown() {
        assert!(eval(Value::Null, BinaryOp::Eq, Value::Null).unwrap().is_null());
    }

    #[test]
    fn test_incompatible_types_fail() {
        assert!(eval(Value::Integer(1), BinaryOp::Eq, Value::from("1")).is_err());
    }
}
