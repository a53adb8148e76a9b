use super::protocol::{Request, Response, ResponseType};
use crate::session::SessionId;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fire-and-forget delivery of responses to a session.
pub trait ResponseSink: Send + Sync {
    /// Sending to a session that is gone is a no-op.
    fn send(&self, session: SessionId, response: Response);
}

/// Line-framed JSON over TCP. Owns the live sessions and their outbound queues.
pub struct Transport {
    sessions: RwLock<HashMap<SessionId, UnboundedSender<Response>>>,
    next_session: AtomicU64,
    inbound_tx: UnboundedSender<Request>,
    capacity: Notify,
}

impl Transport {
    /// Returns the transport and the shared inbound request queue.
    pub fn new() -> (Arc<Self>, UnboundedReceiver<Request>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            inbound_tx,
            capacity: Notify::new(),
        });
        (transport, inbound_rx)
    }

    /// Registers a connection and starts its reader and writer tasks.
    pub fn join(self: &Arc<Self>, stream: TcpStream) -> SessionId {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, outbound_tx);

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(write_loop(session, write_half, outbound_rx));

        let transport = Arc::clone(self);
        tokio::spawn(async move {
            transport.read_loop(session, read_half).await;
            transport.disconnect(session);
        });

        info!("Session {} joined", session);
        session
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_connected(&self, session: SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&session)
    }

    /// Resolves after a session leaves. May also wake spuriously.
    pub async fn capacity_released(&self) {
        self.capacity.notified().await;
    }

    async fn read_loop(&self, session: SessionId, read_half: tokio::net::tcp::OwnedReadHalf) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Response::decode(&line) {
                        Ok(frame) => {
                            if self.inbound_tx.send(Request::new(session, frame)).is_err() {
                                warn!("Inbound queue closed; dropping session {}", session);
                                return;
                            }
                        }
                        Err(e) => self.send(session, Response::error(e.to_string())),
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    debug!("Read error on session {}: {}", session, e);
                    return;
                }
            }
        }
    }

    fn disconnect(&self, session: SessionId) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session)
            .is_some();
        if !removed {
            return;
        }

        self.capacity.notify_one();
        info!("Session {} exited", session);

        let exited = Request::new(session, Response::new(ResponseType::SessionExited, ""));
        if self.inbound_tx.send(exited).is_err() {
            debug!("Inbound queue closed before session {} exit was reported", session);
        }
    }
}

impl ResponseSink for Transport {
    fn send(&self, session: SessionId, response: Response) {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&session) {
            Some(tx) => {
                if tx.send(response).is_err() {
                    debug!("Session {} writer gone; dropped response", session);
                }
            }
            None => debug!("Session {} is gone; dropped {} response", session, response.kind),
        }
    }
}

async fn write_loop(
    session: SessionId,
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound_rx: UnboundedReceiver<Response>,
) {
    while let Some(response) = outbound_rx.recv().await {
        let line = match response.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!("Cannot encode response for session {}: {}", session, e);
                continue;
            }
        };
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            debug!("Write error on session {}: {}", session, e);
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_frames_become_requests() {
        let (transport, mut inbound) = Transport::new();
        let (mut client, server) = connected_pair().await;
        let session = transport.join(server);

        client.write_all(b"{\"Type\":0,\"Data\":\"ping\"}\n").await.unwrap();
        let request = inbound.recv().await.unwrap();
        assert_eq!(request.session_id, session);
        assert_eq!(request.kind(), ResponseType::KeepAlive);
        assert_eq!(request.data(), "ping");
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_error() {
        let (transport, _inbound) = Transport::new();
        let (client, server) = connected_pair().await;
        transport.join(server);

        let (read_half, mut write_half) = client.into_split();
        write_half.write_all(b"garbage\n").await.unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(Response::decode(&line).unwrap().kind, ResponseType::Error);
    }

    #[tokio::test]
    async fn test_disconnect_emits_session_exited() {
        let (transport, mut inbound) = Transport::new();
        let (client, server) = connected_pair().await;
        let session = transport.join(server);
        assert_eq!(transport.session_count(), 1);

        drop(client);
        let request = inbound.recv().await.unwrap();
        assert_eq!(request.kind(), ResponseType::SessionExited);
        assert_eq!(request.session_id, session);
        assert_eq!(transport.session_count(), 0);

        // Sending to the departed session is silently dropped
        transport.send(session, Response::notification("late"));
    }

    #[tokio::test]
    async fn test_send_reaches_client() {
        let (transport, _inbound) = Transport::new();
        let (mut client, server) = connected_pair().await;
        let session = transport.join(server);

        transport.send(session, Response::notification("hello"));
        let expected = Response::notification("hello").encode().unwrap();
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }
}
