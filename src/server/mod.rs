pub mod acceptor;
pub mod binder;
pub mod dispatcher;
pub mod protocol;
pub mod transport;

pub use acceptor::Acceptor;
pub use binder::ContinuationBinder;
pub use dispatcher::Dispatcher;
pub use protocol::{Request, Response, ResponseType};
pub use transport::{ResponseSink, Transport};

use crate::config::ServerConfig;
use crate::core::Result;
use crate::session::SessionRegistry;
use crate::transaction::{TransactionManager, DEFAULT_HISTORY_CAPACITY};
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running server: registry, transaction manager, dispatcher and acceptor.
pub struct Server {
    config: ServerConfig,
    local_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    manager: Arc<TransactionManager>,
    transport: Arc<Transport>,
    stop_tx: Option<oneshot::Sender<()>>,
    acceptor: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Server {
    /// Loads every database under the root and starts accepting connections.
    ///
    /// Fails before anything is accepted if the config is invalid, the bulk
    /// load fails, or the address cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(SessionRegistry::new());
        registry.load_all_databases(&config.root).await?;

        let manager = Arc::new(TransactionManager::start(DEFAULT_HISTORY_CAPACITY));
        let (transport, inbound) = Transport::new();

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&manager),
            transport.clone(),
            config.root.clone(),
            config.block_size,
        ));
        let dispatcher = tokio::spawn(dispatcher.run(inbound));

        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {} (max {} sessions)", local_addr, config.max_sessions);

        let (stop_tx, stop_rx) = oneshot::channel();
        let acceptor = Acceptor::new(listener, Arc::clone(&transport), config.max_sessions);
        let acceptor = tokio::spawn(acceptor.run(stop_rx));

        Ok(Self {
            config,
            local_addr,
            registry,
            manager,
            transport,
            stop_tx: Some(stop_tx),
            acceptor: Some(acceptor),
            dispatcher: Some(dispatcher),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Stops accepting, then drains and stops the transaction manager.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.await;
        }

        self.manager.shutdown().await?;

        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        info!("Server on {} stopped", self.local_addr);
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}
