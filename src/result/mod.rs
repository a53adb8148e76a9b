mod outcome;
mod result;

pub use outcome::CommandOutcome;
pub use result::QueryResult;
