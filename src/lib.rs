// ============================================================================
// ModestDB Library
// ============================================================================

pub mod config;
pub mod core;
pub mod executor;
pub mod evaluator;
pub mod parser;
pub mod plugins;
pub mod result;
pub mod server;
pub mod session;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use core::{DataType, DbError, Result, Value};
pub use parser::{Command, CommandCompiler};
pub use result::{CommandOutcome, QueryResult};
pub use server::{Request, Response, ResponseSink, ResponseType, Server};
pub use session::{SessionId, SessionRegistry};
pub use storage::{Database, StorageEngine};
pub use transaction::{Batch, BoundCommand, TransactionManager};
