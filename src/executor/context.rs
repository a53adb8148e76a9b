use crate::core::{DbError, Result};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry};
use crate::storage::persistence::TableMap;
use crate::storage::table::Table;

/// Mutable view of one database's tables for the duration of a command.
pub struct ExecutionContext<'a> {
    pub tables: &'a mut TableMap,
    pub evaluators: &'a EvaluatorRegistry,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(tables: &'a mut TableMap, evaluators: &'a EvaluatorRegistry) -> Self {
        Self { tables, evaluators }
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn evaluation<'b>(&'b self, table_name: &'b str) -> EvaluationContext<'b> {
        EvaluationContext::new(self.evaluators, table_name)
    }
}
