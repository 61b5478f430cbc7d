//! Secure WebSocket transport for the speech service
//!
//! A thin wrapper over `tokio-tungstenite` with a rustls connector backed by
//! the platform's root certificates. Pings are answered transparently.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        handshake::client::generate_key,
        http::{Request, Uri},
        Message,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

/// Application-level frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

pub struct SpeechSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

fn tls_connector() -> Connector {
    let mut roots = rustls::RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        let _ = roots.add(cert);
    }
    Connector::Rustls(Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    ))
}

impl SpeechSocket {
    /// Open a connection, sending `headers` with the upgrade request
    pub async fn connect(url: &str, headers: &[(&str, String)]) -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let uri: Uri = url.parse().context("Invalid WebSocket URL")?;
        let host = uri.host().context("No host in URL")?;

        let mut builder = Request::builder()
            .method("GET")
            .uri(url)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key());
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = builder.body(()).context("Failed to build WebSocket request")?;

        let (stream, response) =
            connect_async_tls_with_config(request, None, false, Some(tls_connector()))
                .await
                .context("WebSocket connection failed")?;
        debug!("Speech socket connected: {:?}", response.status());

        Ok(Self { stream })
    }

    pub async fn send_text(&mut self, text: String) -> Result<()> {
        let len = text.len();
        self.stream
            .send(Message::Text(text))
            .await
            .context("Failed to send text message")?;
        debug!("Sent text: {} bytes", len);
        Ok(())
    }

    /// Next application frame, or `None` once the stream ends
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => match msg {
                    Message::Text(text) => return Ok(Some(Frame::Text(text))),
                    Message::Binary(data) => return Ok(Some(Frame::Binary(data))),
                    Message::Ping(data) => {
                        let _ = self.stream.send(Message::Pong(data)).await;
                    }
                    Message::Close(frame) => {
                        debug!("Speech socket closed: {:?}", frame);
                        return Ok(Some(Frame::Close));
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                },
                Some(Err(e)) => {
                    return Err(anyhow::Error::new(e).context("WebSocket receive failed"))
                }
                None => return Ok(None),
            }
        }
    }

    /// Like [`recv`](Self::recv) but fails once `timeout` passes without a frame
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| anyhow!("no data from speech service for {timeout:?}"))?
    }

    pub async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .context("Failed to close WebSocket")
    }
}
