//! SQL expression lowering.
//!
//! Each plugin claims a family of `sqlparser` expressions and lowers it into
//! the command [`Expr`] tree. Identifiers and literals are handled by the
//! converter itself.

pub mod binary;
pub mod grouping;
pub mod unary;

use crate::core::{DbError, Result, Value};
use crate::parser::ast::Expr;
use log::debug;
use sqlparser::ast as sql_ast;

/// Converts one family of SQL expressions into command expressions.
pub trait ExpressionPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool;

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr>;
}

pub struct ExpressionPluginRegistry {
    plugins: Vec<Box<dyn ExpressionPlugin>>,
}

impl ExpressionPluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ExpressionPlugin>) {
        debug!("Registered expression plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(grouping::GroupingPlugin));
        registry.register(Box::new(binary::BinaryOperatorPlugin));
        registry.register(Box::new(unary::UnaryOperatorPlugin));

        registry
    }

    pub fn find_plugin(&self, expr: &sql_ast::Expr) -> Option<&dyn ExpressionPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.can_handle(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for ExpressionPluginRegistry {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}

pub struct ExpressionConverter {
    registry: ExpressionPluginRegistry,
}

impl ExpressionConverter {
    pub fn new() -> Self {
        Self {
            registry: ExpressionPluginRegistry::with_default_plugins(),
        }
    }

    pub fn convert(&self, expr: sql_ast::Expr) -> Result<Expr> {
        match &expr {
            sql_ast::Expr::Identifier(ident) => {
                return Ok(Expr::Column(ident.value.clone()));
            }
            sql_ast::Expr::CompoundIdentifier(idents) => {
                // Single-table commands: `t.col` resolves to `col`
                let column = idents
                    .last()
                    .map(|ident| ident.value.clone())
                    .ok_or_else(|| DbError::ParseError("Empty identifier".into()))?;
                return Ok(Expr::Column(column));
            }
            sql_ast::Expr::Value(val) => {
                return Ok(Expr::Literal(self.convert_value(&val.value)?));
            }
            _ => {}
        }

        if let Some(plugin) = self.registry.find_plugin(&expr) {
            return plugin.convert(expr, self);
        }

        Err(DbError::UnsupportedOperation(format!(
            "Unsupported expression: {}",
            expr
        )))
    }

    pub fn convert_value(&self, val: &sql_ast::Value) -> Result<Value> {
        match val {
            sql_ast::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else if let Ok(f) = n.parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(DbError::TypeMismatch(format!("Invalid number: {}", n)))
                }
            }
            sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
            sql_ast::Value::Null => Ok(Value::Null),
            _ => Err(DbError::UnsupportedOperation(format!(
                "Unsupported value: {}",
                val
            ))),
        }
    }
}

impl Default for ExpressionConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::BinaryOp;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn lower(sql: &str) -> Result<Expr> {
        let expr = Parser::new(&PostgreSqlDialect {})
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap();
        ExpressionConverter::new().convert(expr)
    }

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.into()))
    }

    #[test]
    fn test_parentheses_and_negative_literal() {
        let expr = lower("(a + 1) * -2").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                left: Box::new(Expr::BinaryOp {
                    left: col("a"),
                    op: BinaryOp::Add,
                    right: Box::new(Expr::Literal(Value::Integer(1))),
                }),
                op: BinaryOp::Multiply,
                right: Box::new(Expr::Literal(Value::Integer(-2))),
            }
        );
    }

    #[test]
    fn test_predicates() {
        let expr = lower("NOT t.flag OR note IS NOT NULL").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                left: Box::new(Expr::Not { expr: col("flag") }),
                op: BinaryOp::Or,
                right: Box::new(Expr::IsNull { expr: col("note"), negated: true }),
            }
        );
        assert_eq!(lower("-price").unwrap(), Expr::Negate { expr: col("price") });
    }

    #[test]
    fn test_unsupported_expressions() {
        assert!(matches!(lower("a || b"), Err(DbError::UnsupportedOperation(_))));
        assert!(matches!(lower("a LIKE 'x%'"), Err(DbError::UnsupportedOperation(_))));
    }
}
