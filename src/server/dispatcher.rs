use super::binder::ContinuationBinder;
use super::protocol::{Request, Response, ResponseType};
use super::transport::ResponseSink;
use crate::core::{DbError, Result};
use crate::parser::CommandCompiler;
use crate::session::{SessionId, SessionRegistry};
use crate::storage::StorageEngine;
use crate::transaction::{Batch, TransactionManager};
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedReceiver;

/// Routes each inbound request to the registry, compiler, or transaction
/// manager and answers through the response sink.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    manager: Arc<TransactionManager>,
    sink: Arc<dyn ResponseSink>,
    binder: ContinuationBinder,
    compiler: CommandCompiler,
    root: PathBuf,
    block_size: u32,
    /// Requests spawned by [`Dispatcher::run`] and not yet finished, per session.
    in_flight: Mutex<HashMap<SessionId, usize>>,
    drained: Notify,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        manager: Arc<TransactionManager>,
        sink: Arc<dyn ResponseSink>,
        root: PathBuf,
        block_size: u32,
    ) -> Self {
        Self {
            registry,
            manager,
            binder: ContinuationBinder::new(Arc::clone(&sink)),
            sink,
            compiler: CommandCompiler::new(),
            root,
            block_size,
            in_flight: Mutex::new(HashMap::new()),
            drained: Notify::new(),
        }
    }

    /// Handles every request on its own task until the inbound queue closes.
    pub async fn run(self: Arc<Self>, mut inbound: UnboundedReceiver<Request>) {
        while let Some(request) = inbound.recv().await {
            let dispatcher = Arc::clone(&self);
            let session = request.session_id;

            if request.kind() == ResponseType::SessionExited {
                // Released only once every earlier request of the session is done
                tokio::spawn(async move {
                    dispatcher.wait_idle(session).await;
                    dispatcher.handle(request).await;
                });
            } else {
                self.begin(session);
                tokio::spawn(async move {
                    dispatcher.handle(request).await;
                    dispatcher.finish(session);
                });
            }
        }
        debug!("Inbound queue closed; dispatcher exiting");
    }

    fn begin(&self, session: SessionId) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *in_flight.entry(session).or_insert(0) += 1;
    }

    fn finish(&self, session: SessionId) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(count) = in_flight.get_mut(&session) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&session);
                }
            }
        }
        self.drained.notify_waiters();
    }

    async fn wait_idle(&self, session: SessionId) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let busy = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&session);
            if !busy {
                return;
            }
            notified.await;
        }
    }

    /// Errors never escape: they become an `Error` response to the sender.
    pub async fn handle(&self, request: Request) {
        let session = request.session_id;
        let kind = request.kind();
        match self.route(request).await {
            Ok(Some(response)) => self.sink.send(session, response),
            Ok(None) => {}
            Err(e) => {
                debug!("{} request from session {} failed: {}", kind, session, e);
                self.sink.send(session, Response::error(e.to_string()));
            }
        }
    }

    async fn route(&self, request: Request) -> Result<Option<Response>> {
        let session = request.session_id;
        let data = request.data().trim();

        match request.kind() {
            ResponseType::KeepAlive => Ok(Some(Response::new(ResponseType::KeepAlive, "Alive"))),

            ResponseType::NewDatabase => {
                self.registry
                    .create_database(session, data, &self.root, self.block_size)
                    .await?;
                Ok(Some(Response::notification(format!("Database Created {}", data))))
            }

            ResponseType::LoadDatabase => {
                self.registry.pair(session, data).await?;
                Ok(Some(Response::notification(format!("Database Loaded {}", data))))
            }

            ResponseType::NewTable => Err(DbError::UnsupportedOperation(
                "Create tables by sending CREATE TABLE in a Query request".into(),
            )),

            ResponseType::FindTable => {
                let database = self.registry.get_pair(session).await?;
                let table = database
                    .table(data)
                    .await
                    .ok_or_else(|| DbError::TableNotFound(data.to_string()))?;
                Ok(Some(Response::new(ResponseType::FindTable, serde_json::to_string(&table)?)))
            }

            ResponseType::GetMetadata => {
                let databases = self.registry.get_metadata().await;
                let body = serde_json::json!({ "Databases": databases });
                Ok(Some(Response::new(ResponseType::GetMetadata, body.to_string())))
            }

            ResponseType::Query => self.submit_query(session, request.data()).await,

            ResponseType::ShowTransaction => {
                let transactions = self.manager.get_transactions().await;
                let body = serde_json::json!({ "Transactions": transactions });
                Ok(Some(Response::new(ResponseType::ShowTransaction, body.to_string())))
            }

            ResponseType::SessionExited => {
                self.registry.evict(session).await;
                info!("Session {} released its database", session);
                Ok(None)
            }

            ResponseType::DropDb => {
                self.registry.drop_database(data).await?;
                Ok(Some(Response::notification(format!("Database Dropped {}", data))))
            }

            ResponseType::Error | ResponseType::Notification => {
                debug!("Ignoring {} frame from session {}", request.kind(), session);
                Ok(None)
            }
        }
    }

    async fn submit_query(&self, session: SessionId, sql: &str) -> Result<Option<Response>> {
        let database = self.registry.get_pair(session).await?;
        let commands = self.compiler.compile(sql)?;

        let bound = commands
            .into_iter()
            .map(|command| self.binder.bind(session, command))
            .collect();

        match self.manager.add_commands(session, Batch::new(database, bound)).await {
            Ok(_) => Ok(None),
            // Each continuation has already reported the refusal
            Err(DbError::ManagerStopped) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
