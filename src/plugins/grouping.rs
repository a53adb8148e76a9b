use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result};
use crate::parser::ast::Expr;
use sqlparser::ast as sql_ast;

/// Parenthesised expressions and `IS [NOT] NULL`, which wrap a single
/// operand without an operator of their own.
pub struct GroupingPlugin;

impl ExpressionPlugin for GroupingPlugin {
    fn name(&self) -> &'static str {
        "GROUPING"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(
            expr,
            sql_ast::Expr::Nested(_) | sql_ast::Expr::IsNull(_) | sql_ast::Expr::IsNotNull(_)
        )
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Nested(inner) => converter.convert(*inner),
            sql_ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(converter.convert(*inner)?),
                negated: false,
            }),
            sql_ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(converter.convert(*inner)?),
                negated: true,
            }),
            other => Err(DbError::UnsupportedOperation(format!(
                "Unsupported expression: {}",
                other
            ))),
        }
    }
}
