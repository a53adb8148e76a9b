pub mod context;
pub mod ddl;
pub mod dml;
pub mod executor;
pub mod query;

pub use context::ExecutionContext;
pub use executor::{Executor, ExecutorPipeline};
