//! Inbound transport: one WebSocket per session, one segment per binary message.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use crate::config::SessionConfig;
use crate::error::{FeederError, Result};

/// A live channel delivering segment payloads.
#[async_trait]
pub trait SegmentSource: Send {
    /// Next segment payload, or `None` once the publisher has closed the
    /// channel. Must be cancel safe: the session polls it inside `select!`.
    async fn next_segment(&mut self) -> Result<Option<Bytes>>;

    /// Close the channel. Errors from an already-closed channel are ignored.
    async fn close(&mut self) -> Result<()>;
}

/// Opens a [`SegmentSource`] for a session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Source: SegmentSource;

    async fn connect(&self, config: &SessionConfig) -> Result<Self::Source>;
}

#[cfg(feature = "rustls-tls")]
fn install_rustls_provider() {
    use std::sync::OnceLock;

    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Source = WebSocketSource;

    async fn connect(&self, config: &SessionConfig) -> Result<WebSocketSource> {
        #[cfg(feature = "rustls-tls")]
        install_rustls_provider();

        let url = config.connection_uri()?.to_string();
        let timeout = config.connect_timeout();
        info!(url = %url, "Connecting to publisher");

        match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, response))) => {
                debug!(url = %url, status = %response.status(), "WebSocket handshake complete");
                Ok(WebSocketSource { stream, url })
            }
            Ok(Err(source)) => Err(FeederError::Connect { url, source }),
            Err(_) => Err(FeederError::ConnectTimeout { url, timeout }),
        }
    }
}

pub struct WebSocketSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl WebSocketSource {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SegmentSource for WebSocketSource {
    async fn next_segment(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Ignoring text message");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "Publisher closed the connection");
                    return Ok(None);
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => return Ok(None),
                // Publishers commonly drop the socket without a close frame.
                Some(Err(tungstenite::Error::Protocol(
                    ProtocolError::ResetWithoutClosingHandshake,
                ))) => {
                    debug!("Publisher reset the connection without a close frame");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
