use super::transport::Transport;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
const CAPACITY_POLL: Duration = Duration::from_millis(50);

/// Accepts connections while the live session count is below the ceiling.
///
/// At the ceiling it stops calling `accept` until a session leaves, so extra
/// clients wait in the listen backlog instead of being admitted.
pub struct Acceptor {
    listener: TcpListener,
    transport: Arc<Transport>,
    max_sessions: usize,
}

impl Acceptor {
    pub fn new(listener: TcpListener, transport: Arc<Transport>, max_sessions: usize) -> Self {
        Self {
            listener,
            transport,
            max_sessions,
        }
    }

    pub async fn run(self, mut stop_rx: oneshot::Receiver<()>) {
        loop {
            while self.transport.session_count() >= self.max_sessions {
                tokio::select! {
                    _ = &mut stop_rx => return,
                    _ = self.transport.capacity_released() => {}
                    _ = sleep(CAPACITY_POLL) => {}
                }
            }

            tokio::select! {
                _ = &mut stop_rx => return,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = self.transport.join(stream);
                        info!("Accepted {} as session {}", peer, session);
                    }
                    Err(e) => {
                        warn!("Accept failed: {}; retrying in {:?}", e, ACCEPT_RETRY_DELAY);
                        sleep(ACCEPT_RETRY_DELAY).await;
                    }
                }
            }
        }
    }
}
