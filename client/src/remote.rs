//! Control-channel client: command emission and snapshot decoding.

use log::info;
use shared::commands::ControlKey;
use shared::snapshot::{FrameDecoder, SensingSnapshot, SnapshotError};
use shared::Vec3;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("telemetry stream corrupt: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("server closed the connection")]
    Disconnected,
}

/// One live connection to the simulation server.
pub struct RemoteClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl RemoteClient {
    pub async fn connect(addr: &str) -> Result<RemoteClient, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to simulation server at {}", addr);
        Ok(RemoteClient {
            stream,
            decoder: FrameDecoder::new(),
        })
    }

    /// Sends one raw command line; the newline terminator is appended.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn push(&mut self, key: ControlKey) -> Result<(), ClientError> {
        self.send_line(&format!("push {}", key.token())).await
    }

    pub async fn release(&mut self, key: ControlKey) -> Result<(), ClientError> {
        self.send_line(&format!("release {}", key.token())).await
    }

    pub async fn release_all(&mut self) -> Result<(), ClientError> {
        self.send_line("release all").await
    }

    /// Rewrites the respawn position (takes effect on the next reset).
    pub async fn set_reset_position(&mut self, position: Vec3) -> Result<(), ClientError> {
        self.send_line(&format!(
            "set position {},{},{}",
            position.x, position.y, position.z
        ))
        .await
    }

    /// Rewrites the respawn heading, degrees.
    pub async fn set_reset_rotation(&mut self, heading: f32) -> Result<(), ClientError> {
        self.send_line(&format!("set rotation {}", heading)).await
    }

    pub async fn set_ray_visible(&mut self, visible: bool) -> Result<(), ClientError> {
        let state = if visible { "visible" } else { "hidden" };
        self.send_line(&format!("set ray {}", state)).await
    }

    pub async fn reset(&mut self) -> Result<(), ClientError> {
        self.send_line("reset").await
    }

    /// Waits for and returns the next telemetry snapshot.
    pub async fn next_snapshot(&mut self) -> Result<SensingSnapshot, ClientError> {
        loop {
            if let Some(snapshot) = self.decoder.next_frame()? {
                return Ok(snapshot);
            }

            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ClientError::Disconnected);
            }
            self.decoder.push_bytes(&buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (RemoteClient, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr_str = addr.to_string();
        let (client, accepted) =
            tokio::join!(RemoteClient::connect(&addr_str), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_command_helpers_emit_grammar_lines() {
        let (mut client, mut server_side) = loopback_pair().await;

        client.push(ControlKey::Forward).await.unwrap();
        client.release(ControlKey::Back).await.unwrap();
        client.release_all().await.unwrap();
        client
            .set_reset_position(Vec3::new(12.0, -35.0, 76.0))
            .await
            .unwrap();
        client.set_reset_rotation(90.0).await.unwrap();
        client.set_ray_visible(true).await.unwrap();
        client.reset().await.unwrap();

        let expected = "push forward\nrelease back\nrelease all\n\
                        set position 12,-35,76\nset rotation 90\nset ray visible\nreset\n";

        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        while received.len() < expected.len() {
            let n = server_side.read(&mut buf).await.unwrap();
            assert!(n > 0, "peer closed early");
            received.extend_from_slice(&buf[..n]);
        }

        assert_eq!(String::from_utf8_lossy(&received), expected);
    }

    #[tokio::test]
    async fn test_next_snapshot_decodes_stream() {
        let (mut client, mut server_side) = loopback_pair().await;

        let snapshot = SensingSnapshot {
            up: true,
            car_speed: 21.5,
            ray_distances: vec![1.0; 15],
            ..SensingSnapshot::default()
        };
        let frame = snapshot.pack().unwrap();

        // Deliver the frame in two halves to exercise buffering.
        let (head, tail) = frame.split_at(frame.len() / 2);
        server_side.write_all(head).await.unwrap();
        server_side.flush().await.unwrap();
        server_side.write_all(tail).await.unwrap();

        let decoded = client.next_snapshot().await.unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[tokio::test]
    async fn test_disconnect_is_reported() {
        let (mut client, server_side) = loopback_pair().await;
        drop(server_side);

        let result = client.next_snapshot().await;
        assert!(matches!(result, Err(ClientError::Disconnected)));
    }
}
