//! Opening the byte stream a [`WebSocketClient`] runs over.
//!
//! Plain `ws://` endpoints get a TCP stream; `wss://` endpoints are wrapped in
//! rustls when the `tls-rustls` feature is enabled.

mod endpoint;
#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use endpoint::Endpoint;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::Config;
use crate::connection::WebSocketClient;
use crate::error::Result;

/// A TCP stream, optionally wrapped in TLS.
#[derive(Debug)]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    #[cfg(feature = "tls-rustls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    #[must_use]
    pub fn is_tls(&self) -> bool {
        !matches!(self, MaybeTlsStream::Plain(_))
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Open a TCP connection to `endpoint`, with TLS for `wss://`.
///
/// # Errors
///
/// `Error::Io` if the connection fails, `Error::Tls` for `wss://` without the
/// `tls-rustls` feature or with an unusable server name.
pub async fn open(endpoint: &Endpoint) -> Result<MaybeTlsStream> {
    let tcp = TcpStream::connect((endpoint.host(), endpoint.port())).await?;
    tcp.set_nodelay(true)?;
    debug!(host = endpoint.host(), port = endpoint.port(), secure = endpoint.is_secure(), "tcp connected");
    if endpoint.is_secure() {
        secure(endpoint, tcp).await
    } else {
        Ok(MaybeTlsStream::Plain(tcp))
    }
}

#[cfg(feature = "tls-rustls")]
async fn secure(endpoint: &Endpoint, tcp: TcpStream) -> Result<MaybeTlsStream> {
    let connector = tls::TlsConnector::new(tls::client_config_with_webpki_roots());
    let stream = connector.connect(endpoint.host(), tcp).await?;
    Ok(MaybeTlsStream::Tls(Box::new(stream)))
}

#[cfg(not(feature = "tls-rustls"))]
async fn secure(_endpoint: &Endpoint, _tcp: TcpStream) -> Result<MaybeTlsStream> {
    Err(crate::error::Error::Tls(
        "wss:// requires the tls-rustls feature".into(),
    ))
}

/// Resolve `url`, open the stream and build an unconnected client for it.
///
/// The returned client has not sent its handshake yet; call
/// [`WebSocketClient::connect`] with a handler to start it.
///
/// # Errors
///
/// Fails on a bad URL or if the stream cannot be opened.
pub async fn connect(url: &str, config: Config) -> Result<WebSocketClient<MaybeTlsStream>> {
    let endpoint = Endpoint::parse(url)?;
    let stream = open(&endpoint).await?;
    WebSocketClient::new(stream, &endpoint.host_header(), endpoint.resource(), config)
}
