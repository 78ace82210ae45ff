//! WebSocket server the in-page agent connects to.
//!
//! # Connection Flow
//!
//! 1. Rust binds WebSocket server to `localhost:0` (random port)
//! 2. The page is opened with the agent pointed at the WebSocket URL
//! 3. Agent connects to WebSocket server
//! 4. Agent sends READY message with session ID and page URL
//! 5. Connection established, ready for commands

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;
use super::connection::ReadyData;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for waiting for the agent to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PendingServer
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use cascade_harvest::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("point the agent at {}", server.ws_url());
///
/// let (connection, ready) = server.accept().await?;
/// ```
pub struct PendingServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the server is bound to.
    addr: SocketAddr,
    /// How long `accept` waits for the agent.
    accept_timeout: Duration,
}

impl PendingServer {
    /// Binds a WebSocket server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(%addr, "WebSocket server bound");

        Ok(Self {
            listener,
            addr,
            accept_timeout: CONNECTION_TIMEOUT,
        })
    }

    /// Overrides how long [`accept`](Self::accept) waits for the agent.
    #[must_use]
    pub fn with_accept_timeout(mut self, accept_timeout: Duration) -> Self {
        self.accept_timeout = accept_timeout;
        self
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the WebSocket URL for this server.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts the agent's connection and completes the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the agent doesn't connect in time
    /// - [`Error::Connection`] if WebSocket upgrade fails
    /// - [`Error::ConnectionClosed`] if the agent leaves before READY
    pub async fn accept(self) -> Result<(Connection, ReadyData)> {
        let (stream, peer) = timeout(self.accept_timeout, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(self.accept_timeout.as_millis() as u64))??;

        debug!(?peer, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port(), "WebSocket connection established");

        let connection = Connection::new(ws_stream);
        let ready = connection.wait_ready().await?;

        Ok((connection, ready))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio_tungstenite::tungstenite::Message;

    use crate::identifiers::RequestId;
    use crate::protocol::Command;

    async fn bind() -> PendingServer {
        PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed")
    }

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = bind().await;

        assert!(server.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://127.0.0.1:{}", server.port()));
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_accept_times_out_without_agent() {
        let server = bind().await.with_accept_timeout(Duration::from_millis(50));

        let err = server.accept().await.err().expect("timeout");
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_handshake_and_round_trip() {
        let server = bind().await;
        let url = server.ws_url();

        let agent = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url)
                .await
                .expect("agent connects");

            let ready = json!({
                "id": RequestId::ready(),
                "type": "success",
                "result": {"sessionId": 7, "url": "https://example.org/igr"}
            });
            ws.send(Message::Text(ready.to_string().into()))
                .await
                .expect("send ready");

            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected a request");
            };
            let request: Value = serde_json::from_str(&text).expect("request json");
            assert_eq!(request["method"], "control.locate");

            let reply = json!({
                "id": request["id"],
                "type": "success",
                "result": {"controlIds": ["ctl-1"]}
            });
            ws.send(Message::Text(reply.to_string().into()))
                .await
                .expect("send reply");

            // Hold the socket open until the server side is done.
            let _ = ws.next().await;
        });

        let (connection, ready) = server.accept().await.expect("accept");
        assert_eq!(ready.session_id, 7);
        assert_eq!(ready.url, "https://example.org/igr");

        let response = connection
            .send(
                Command::Locate(crate::surface::Locator::id("zone")),
                Duration::from_secs(5),
            )
            .await
            .expect("response");
        assert!(response.is_success());
        assert_eq!(connection.pending_count(), 0);

        connection.shutdown();
        agent.await.expect("agent task");
    }
}
