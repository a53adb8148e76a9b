use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result};
use crate::parser::ast::{BinaryOp, Expr};
use sqlparser::ast::{self as sql_ast, BinaryOperator as SqlOp};

/// Every infix operator the evaluator understands: arithmetic, comparison
/// and AND/OR.
pub struct BinaryOperatorPlugin;

impl ExpressionPlugin for BinaryOperatorPlugin {
    fn name(&self) -> &'static str {
        "BINARY"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::BinaryOp { op, .. } if binary_op(op).is_some())
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        let (left, op, right) = match expr {
            sql_ast::Expr::BinaryOp { left, op, right } => (left, op, right),
            other => {
                return Err(DbError::UnsupportedOperation(format!(
                    "Expected binary expression, got: {}",
                    other
                )));
            }
        };

        let op = binary_op(&op)
            .ok_or_else(|| DbError::UnsupportedOperation(format!("Unsupported binary operator: {}", op)))?;

        Ok(Expr::BinaryOp {
            left: Box::new(converter.convert(*left)?),
            op,
            right: Box::new(converter.convert(*right)?),
        })
    }
}

pub fn binary_op(op: &SqlOp) -> Option<BinaryOp> {
    Some(match op {
        SqlOp::Plus => BinaryOp::Add,
        SqlOp::Minus => BinaryOp::Subtract,
        SqlOp::Multiply => BinaryOp::Multiply,
        SqlOp::Divide => BinaryOp::Divide,
        SqlOp::Modulo => BinaryOp::Modulo,

        SqlOp::Eq => BinaryOp::Eq,
        SqlOp::NotEq => BinaryOp::NotEq,
        SqlOp::Lt => BinaryOp::Lt,
        SqlOp::LtEq => BinaryOp::LtEq,
        SqlOp::Gt => BinaryOp::Gt,
        SqlOp::GtEq => BinaryOp::GtEq,

        SqlOp::And => BinaryOp::And,
        SqlOp::Or => BinaryOp::Or,

        _ => return None,
    })
}
