//! Event logger for the backend's WebSocket endpoint.
//!
//! Connects once and logs what happens. No reconnection and no protocol.

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct SocketLogger {
    url: String,
}

impl SocketLogger {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and log events until the server closes or the stream fails.
    /// Returns the number of data messages seen.
    pub async fn run(&self) -> Result<usize> {
        let (mut stream, response) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;
        info!(url = %self.url, status = %response.status(), "WebSocket is open");

        let mut received = 0;
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    received += 1;
                    info!(message = %text, "Message from server");
                }
                Ok(Message::Binary(bytes)) => {
                    received += 1;
                    info!(bytes = bytes.len(), "Binary message from server");
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }

        info!(url = %self.url, received, "WebSocket is closed");
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;

    /// A local port nothing listens on any more
    fn released_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_to_connect() {
        let url = format!("ws://127.0.0.1:{}/ws", released_port());
        let err = SocketLogger::new(url.clone()).run().await.expect_err("port is closed");
        assert!(err.to_string().contains(&format!("Failed to connect to {}", url)));
    }

    #[tokio::test]
    async fn test_counts_messages_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("handshake");
            ws.send(Message::Text("tide table updated".into())).await.expect("send text");
            ws.send(Message::Binary(vec![1, 2, 3])).await.expect("send binary");
            ws.close(None).await.expect("close");
        });

        let logger = SocketLogger::new(format!("ws://{}/ws", addr));
        assert_eq!(logger.run().await.expect("run"), 2);
        server.await.expect("server task");
    }
}
