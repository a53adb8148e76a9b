pub mod batch;
pub mod manager;
pub mod state;

pub use batch::{Batch, BoundCommand, Continuation};
pub use manager::{TransactionManager, DEFAULT_HISTORY_CAPACITY};
pub use state::{TransactionId, TransactionInfo, TransactionState};
