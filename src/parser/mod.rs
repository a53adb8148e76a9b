pub mod adapter;
pub mod ast;

pub use adapter::CommandCompiler;
pub use ast::{Command, CommandKind};
