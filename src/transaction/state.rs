use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier the transaction manager assigns to each admitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub(crate) fn next() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// ```text
/// Queued ──dequeue──> Executing ──last command──> Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    Queued,
    Executing,
    Completed,
}

impl TransactionState {
    pub fn is_pending(&self) -> bool {
        !matches!(self, TransactionState::Completed)
    }
}

/// Introspection record for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub session_id: u64,
    pub database: String,
    pub commands: Vec<String>,
    pub state: TransactionState,
    pub submitted_at_ms: u64,
    /// Commands whose execution returned an error. Zero until completed.
    pub failed: usize,
}
