use crate::core::Result;
use crate::parser::ast::Command;
use crate::result::CommandOutcome;
use crate::storage::StorageEngine;
use std::sync::Arc;

/// One-shot completion callback for a single command.
pub type Continuation = Box<dyn FnOnce(Result<CommandOutcome>) + Send + 'static>;

pub struct BoundCommand {
    pub command: Command,
    pub continuation: Continuation,
}

impl BoundCommand {
    pub fn new(command: Command, continuation: Continuation) -> Self {
        Self {
            command,
            continuation,
        }
    }
}

/// Commands compiled from one query submission, bound to the database they run against.
pub struct Batch {
    pub database: Arc<dyn StorageEngine>,
    pub commands: Vec<BoundCommand>,
}

impl Batch {
    pub fn new(database: Arc<dyn StorageEngine>, commands: Vec<BoundCommand>) -> Self {
        Self { database, commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
