//! Single-client TCP transport for remote control and telemetry.
//!
//! At most one controller is connected at a time. While no client is held
//! the listener accepts with a short bounded timeout so a quiet network
//! never stalls a frame; once a client connects the listener is closed and
//! reopened only after the client drops. Reads and writes are
//! non-blocking: a stalled peer misses snapshots instead of blocking the
//! tick, and partial writes are not recovered.

use log::{debug, info, warn};
use shared::commands::CommandQueue;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// How long a tick is willing to wait on the accept call.
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(10);
/// Read chunk size per try_read call.
const READ_BUFFER_LEN: usize = 1024;

pub struct ConnectionManager {
    bind_addr: SocketAddr,
    listener: Option<TcpListener>,
    client: Option<(TcpStream, SocketAddr)>,
    /// FIFO of raw command bytes awaiting parsing.
    pub commands: CommandQueue,
}

impl ConnectionManager {
    pub fn new(bind_addr: SocketAddr) -> ConnectionManager {
        ConnectionManager {
            bind_addr,
            listener: None,
            client: None,
            commands: CommandQueue::new(),
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Address the listener is currently bound to, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// One network cycle: accept while idle, otherwise drain the client's
    /// pending bytes into the command queue.
    pub async fn poll(&mut self) {
        if self.client.is_some() {
            self.drain_client();
        } else {
            self.accept_client().await;
        }
    }

    async fn accept_client(&mut self) {
        if self.listener.is_none() {
            match TcpListener::bind(self.bind_addr).await {
                Ok(listener) => {
                    // Pin the resolved address so an ephemeral port stays
                    // stable across reconnects.
                    if let Ok(local) = listener.local_addr() {
                        self.bind_addr = local;
                    }
                    info!("Waiting for controller connections on {}", self.bind_addr);
                    self.listener = Some(listener);
                }
                Err(e) => {
                    warn!("Failed to open listener on {}: {}", self.bind_addr, e);
                    return;
                }
            }
        }

        let Some(listener) = &self.listener else {
            return;
        };

        match timeout(ACCEPT_TIMEOUT, listener.accept()).await {
            Ok(Ok((stream, addr))) => {
                info!("Controller connecting from {}", addr);
                self.client = Some((stream, addr));
                // One client at a time: stop listening until it leaves.
                self.listener = None;
            }
            Ok(Err(e)) => warn!("Accept failed: {}", e),
            Err(_) => {} // nobody knocked this tick
        }
    }

    fn drain_client(&mut self) {
        let mut disconnect = false;

        if let Some((stream, addr)) = &mut self.client {
            let mut buf = [0u8; READ_BUFFER_LEN];
            loop {
                match stream.try_read(&mut buf) {
                    Ok(0) => {
                        info!("Controller {} closed the connection", addr);
                        disconnect = true;
                        break;
                    }
                    Ok(n) => self.commands.push_bytes(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("Read error from {}: {}", addr, e);
                        disconnect = true;
                        break;
                    }
                }
            }
        }

        if disconnect {
            self.drop_client();
        }
    }

    /// Sends one pre-packed telemetry frame. Failures are logged and cost
    /// at most this frame; a fatal transport error drops the client.
    pub fn send_frame(&mut self, frame: &[u8]) {
        let mut disconnect = false;

        if let Some((stream, addr)) = &mut self.client {
            match stream.try_write(frame) {
                Ok(n) if n < frame.len() => {
                    warn!(
                        "Partial snapshot write to {} ({} of {} bytes)",
                        addr,
                        n,
                        frame.len()
                    );
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    debug!("Snapshot dropped, {} not ready", addr);
                }
                Err(e) => {
                    warn!("Write error to {}: {}", addr, e);
                    disconnect = true;
                }
            }
        }

        if disconnect {
            self.drop_client();
        }
    }

    /// Drops the connected client and its buffered commands; the listener
    /// reopens on the next poll.
    pub fn drop_client(&mut self) {
        if let Some((_, addr)) = self.client.take() {
            info!("Controller {} disconnected", addr);
        }
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::commands::{ControlKey, RemoteCommand};
    use tokio::io::AsyncWriteExt;

    async fn connected_pair() -> (ConnectionManager, TcpStream) {
        let mut manager = ConnectionManager::new("127.0.0.1:0".parse().unwrap());

        // First poll binds the listener but nobody is knocking yet.
        manager.poll().await;
        assert!(!manager.has_client());
        let addr = manager.local_addr().unwrap();

        let peer = TcpStream::connect(addr).await.unwrap();
        manager.poll().await;
        assert!(manager.has_client());

        (manager, peer)
    }

    #[tokio::test]
    async fn test_accept_closes_listener() {
        let (manager, _peer) = connected_pair().await;
        assert!(manager.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_commands_flow_into_queue() {
        let (mut manager, mut peer) = connected_pair().await;

        peer.write_all(b"push forward\nrelease all\n").await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        manager.poll().await;

        assert_eq!(
            manager.commands.parse_next_command(),
            Ok(Some(RemoteCommand::Push(ControlKey::Forward)))
        );
        assert_eq!(
            manager.commands.parse_next_command(),
            Ok(Some(RemoteCommand::ReleaseAll))
        );
    }

    #[tokio::test]
    async fn test_peer_disconnect_detected_on_poll() {
        let (mut manager, peer) = connected_pair().await;

        drop(peer);
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.poll().await;

        assert!(!manager.has_client());
        assert!(manager.commands.is_empty());
    }

    #[tokio::test]
    async fn test_drop_client_discards_buffered_commands() {
        let (mut manager, mut peer) = connected_pair().await;

        peer.write_all(b"push forward\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.poll().await;
        assert!(!manager.commands.is_empty());

        manager.drop_client();
        assert!(!manager.has_client());
        assert!(manager.commands.is_empty());
    }

    #[tokio::test]
    async fn test_send_frame_without_client_is_noop() {
        let mut manager = ConnectionManager::new("127.0.0.1:0".parse().unwrap());
        manager.send_frame(&[1, 2, 3]);
        assert!(!manager.has_client());
    }
}
