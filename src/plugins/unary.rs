use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result, Value};
use crate::parser::ast::Expr;
use sqlparser::ast::{self as sql_ast, UnaryOperator};

/// Prefix `NOT`, `-` and `+`.
pub struct UnaryOperatorPlugin;

impl ExpressionPlugin for UnaryOperatorPlugin {
    fn name(&self) -> &'static str {
        "UNARY"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(
            expr,
            sql_ast::Expr::UnaryOp {
                op: UnaryOperator::Not | UnaryOperator::Minus | UnaryOperator::Plus,
                ..
            }
        )
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        let (op, operand) = match expr {
            sql_ast::Expr::UnaryOp { op, expr } => (op, expr),
            other => {
                return Err(DbError::UnsupportedOperation(format!(
                    "Expected unary expression, got: {}",
                    other
                )));
            }
        };

        let operand = converter.convert(*operand)?;
        match op {
            UnaryOperator::Not => Ok(Expr::Not {
                expr: Box::new(operand),
            }),
            UnaryOperator::Plus => Ok(operand),
            // Fold negative literals so `VALUES (-1)` stays a literal
            UnaryOperator::Minus => Ok(match operand {
                Expr::Literal(Value::Integer(i)) => Expr::Literal(Value::Integer(-i)),
                Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                other => Expr::Negate {
                    expr: Box::new(other),
                },
            }),
            other => Err(DbError::UnsupportedOperation(format!(
                "Unsupported unary operator: {}",
                other
            ))),
        }
    }
}
