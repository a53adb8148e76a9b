pub mod plugins;

use crate::core::{DbError, Result, Row, Schema, Value};
use crate::parser::ast::Expr;
use log::debug;

/// Evaluates one family of expressions against a row.
pub trait ExpressionEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_evaluate(&self, expr: &Expr) -> bool;

    fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema, context: &EvaluationContext<'_>) -> Result<Value>;
}

pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
    table_name: &'a str,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(registry: &'a EvaluatorRegistry, table_name: &'a str) -> Self {
        Self { registry, table_name }
    }

    pub fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema) -> Result<Value> {
        match expr {
            Expr::Column(name) => {
                let idx = schema
                    .find_column_index(name)
                    .ok_or_else(|| DbError::ColumnNotFound(name.clone(), self.table_name.to_string()))?;
                return row
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| DbError::ExecutionError(format!("Row is missing column '{}'", name)));
            }
            Expr::Literal(val) => return Ok(val.clone()),
            _ => {}
        }

        if let Some(evaluator) = self.registry.find_evaluator(expr) {
            return evaluator.evaluate(expr, row, schema, self);
        }

        Err(DbError::UnsupportedOperation(format!(
            "No evaluator found for expression: {}",
            expr.display_name()
        )))
    }

    /// WHERE semantics: absent predicate keeps every row.
    pub fn matches(&self, predicate: Option<&Expr>, row: &Row, schema: &Schema) -> Result<bool> {
        match predicate {
            Some(expr) => Ok(self.evaluate(expr, row, schema)?.as_bool()),
            None => Ok(true),
        }
    }
}

pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        debug!("Registered evaluator: {}", evaluator.name());
        self.evaluators.push(evaluator);
    }

    pub fn with_default_evaluators() -> Self {
        use plugins::*;

        let mut registry = Self::new();
        registry.register(Box::new(comparison::ComparisonEvaluator));
        registry.register(Box::new(arithmetic::ArithmeticEvaluator));
        registry.register(Box::new(logical::LogicalEvaluator));
        registry
    }

    fn find_evaluator(&self, expr: &Expr) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}
