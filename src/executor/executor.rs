use super::ExecutionContext;
use crate::core::{DbError, Result};
use crate::parser::ast::Command;
use crate::result::CommandOutcome;

pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, command: &Command) -> bool;

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome>;
}

pub struct ExecutorPipeline {
    executors: Vec<Box<dyn Executor>>,
}

impl ExecutorPipeline {
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
        }
    }

    pub fn with_default_executors() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(super::ddl::CreateTableExecutor));
        pipeline.register(Box::new(super::ddl::DropTableExecutor));
        pipeline.register(Box::new(super::ddl::AlterTableExecutor));
        pipeline.register(Box::new(super::dml::InsertExecutor));
        pipeline.register(Box::new(super::dml::UpdateExecutor));
        pipeline.register(Box::new(super::dml::DeleteExecutor));
        pipeline.register(Box::new(super::query::QueryExecutor));
        pipeline
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) {
        log::debug!("Registered executor: {}", executor.name());
        self.executors.push(executor);
    }

    pub fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        for executor in &self.executors {
            if executor.can_handle(command) {
                return executor.execute(command, ctx);
            }
        }

        Err(DbError::UnsupportedOperation(format!(
            "No executor found for {}",
            command.kind()
        )))
    }
}

impl Default for ExecutorPipeline {
    fn default() -> Self {
        Self::with_default_executors()
    }
}
