use super::batch::{Batch, BoundCommand, Continuation};
use super::state::{TransactionId, TransactionInfo, TransactionState};
use crate::core::{DbError, Result};
use crate::session::SessionId;
use log::{debug, error, info};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, error::SendError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span};

pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

struct Job {
    id: TransactionId,
    session_id: SessionId,
    batch: Batch,
}

/// Pending batches plus a bounded tail of completed ones, in admission order.
struct History {
    entries: VecDeque<TransactionInfo>,
    capacity: usize,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    fn find_mut(&mut self, id: TransactionId) -> Option<&mut TransactionInfo> {
        self.entries.iter_mut().find(|info| info.id == id)
    }

    fn mark_executing(&mut self, id: TransactionId) {
        if let Some(info) = self.find_mut(id) {
            info.state = TransactionState::Executing;
        }
    }

    fn mark_completed(&mut self, id: TransactionId, failed: usize) {
        if let Some(info) = self.find_mut(id) {
            info.state = TransactionState::Completed;
            info.failed = failed;
        }
        // Batches complete in admission order, so finished ones sit at the front
        while self.entries.len() > self.capacity
            && self.entries.front().is_some_and(|info| !info.state.is_pending())
        {
            self.entries.pop_front();
        }
    }
}

/// The single serialization point for command execution.
///
/// Batches are queued by [`add_commands`](Self::add_commands) and executed one
/// command at a time, in admission order, by one worker task.
pub struct TransactionManager {
    queue_tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    history: Arc<RwLock<History>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionManager {
    /// Spawns the execution worker. Must be called inside a tokio runtime.
    pub fn start(history_capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let history = Arc::new(RwLock::new(History::new(history_capacity)));

        let join_handle = tokio::spawn(run_worker(queue_rx, history.clone()));
        info!("Transaction manager started");

        Self {
            queue_tx: Mutex::new(Some(queue_tx)),
            history,
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    /// Queues `batch` and returns without waiting for execution.
    ///
    /// Once the manager is stopped every continuation in the batch is invoked
    /// with [`DbError::ManagerStopped`].
    pub async fn add_commands(&self, session_id: SessionId, batch: Batch) -> Result<TransactionId> {
        if batch.is_empty() {
            return Err(DbError::ExecutionError("Batch contains no commands".into()));
        }

        let queue = self.queue_tx.lock().await;
        let Some(tx) = queue.as_ref() else {
            fail_all(batch);
            return Err(DbError::ManagerStopped);
        };

        let id = TransactionId::next();
        let info = TransactionInfo {
            id,
            session_id,
            database: batch.database.name().to_string(),
            commands: batch.commands.iter().map(|bc| bc.command.summary()).collect(),
            state: TransactionState::Queued,
            submitted_at_ms: now_ms(),
            failed: 0,
        };
        let len = batch.len();

        // History entry and queue slot are taken under one lock so they agree on order
        let mut history = self.history.write().await;
        match tx.send(Job { id, session_id, batch }) {
            Ok(()) => {
                history.entries.push_back(info);
                debug!("Admitted {} ({} command(s)) from session {}", id, len, session_id);
                Ok(id)
            }
            Err(SendError(job)) => {
                drop(history);
                fail_all(job.batch);
                Err(DbError::ManagerStopped)
            }
        }
    }

    /// Queued, executing, and recently completed batches, oldest first.
    pub async fn get_transactions(&self) -> Vec<TransactionInfo> {
        self.history.read().await.entries.iter().cloned().collect()
    }

    pub async fn is_running(&self) -> bool {
        self.queue_tx.lock().await.is_some()
    }

    /// Stops admission, lets the worker drain the queue, and waits for it.
    pub async fn shutdown(&self) -> Result<()> {
        // Dropping the sender ends the worker once the queue is empty
        self.queue_tx.lock().await.take();

        if let Some(join_handle) = self.join_handle.lock().await.take() {
            join_handle
                .await
                .map_err(|err| DbError::ExecutionError(format!("transaction worker join: {}", err)))?;
            info!("Transaction manager stopped");
        }
        Ok(())
    }
}

async fn run_worker(mut queue_rx: mpsc::UnboundedReceiver<Job>, history: Arc<RwLock<History>>) {
    while let Some(job) = queue_rx.recv().await {
        let span = info_span!(
            "batch",
            txn = %job.id,
            session = job.session_id,
            database = %job.batch.database.name()
        );
        execute_job(job, &history).instrument(span).await;
    }
    debug!("Transaction queue closed");
}

async fn execute_job(job: Job, history: &RwLock<History>) {
    history.write().await.mark_executing(job.id);

    let Batch { database, commands } = job.batch;
    let mut failed = 0;
    for BoundCommand { command, continuation } in commands {
        let result = database.execute(&command).await;
        if let Err(err) = &result {
            failed += 1;
            debug!("{} failed in {}: {}", command.summary(), job.id, err);
        }
        invoke(continuation, result);
    }

    history.write().await.mark_completed(job.id, failed);
    debug!("Completed {} ({} failed)", job.id, failed);
}

fn invoke(continuation: Continuation, result: Result<crate::result::CommandOutcome>) {
    if panic::catch_unwind(AssertUnwindSafe(move || continuation(result))).is_err() {
        error!("Continuation panicked; moving on to the next command");
    }
}

fn fail_all(batch: Batch) {
    for bound in batch.commands {
        invoke(bound.continuation, Err(DbError::ManagerStopped));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
