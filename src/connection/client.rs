use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::config::Config;
use crate::connection::{ConnectionState, Handler};
use crate::error::{Error, Result};
use crate::lock;
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::handshake::{
    ClientHandshake, HandshakeState, ServerHandshake, validate_response,
};
use crate::protocol::{Frame, FrameDecoder, MessageAssembler};

const STOPPED_BY_CLIENT: &str = "Stopped by client";
const CLOSED_BY_PEER: &str = "Connection closed by peer";

struct Shared<S> {
    config: Config,
    request: ClientHandshake,
    state: Mutex<ConnectionState>,
    /// The stream until `connect` hands it to the reader task.
    stream: Mutex<Option<S>>,
    /// The single write section. `None` before the reader starts and after
    /// the connection closed.
    writer: AsyncMutex<Option<WriteHalf<S>>>,
    started: AtomicBool,
    last_pong: Mutex<Instant>,
    close_reason: Mutex<Option<String>>,
    shutdown: Notify,
}

impl<S> Shared<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn advance(&self, next: ConnectionState) -> bool {
        lock(&self.state).advance(next)
    }

    fn requested_reason(&self) -> String {
        lock(&self.close_reason)
            .clone()
            .unwrap_or_else(|| STOPPED_BY_CLIENT.to_string())
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(Error::NotConnected)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        trace!(opcode = %frame.opcode, len = bytes.len(), "send frame");
        self.write_raw(&bytes).await
    }

    /// Best-effort close frame; the connection is going away regardless.
    async fn send_close(&self, close: Option<&CloseFrame>) {
        if let Err(err) = self.write_frame(&Frame::close(close)).await {
            debug!(error = %err, "close frame not sent");
        }
    }

    /// Read into `buf`, or `None` once shutdown was requested.
    async fn read(&self, reader: &mut ReadHalf<S>, buf: &mut [u8]) -> Result<Option<usize>> {
        tokio::select! {
            biased;
            () = self.shutdown.notified() => Ok(None),
            read = reader.read(buf) => Ok(Some(read?)),
        }
    }

    async fn finish(&self) {
        self.advance(ConnectionState::Closed);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

/// Client end of a WebSocket connection over any byte stream.
///
/// The handle is cheap to clone; all clones drive the same connection.
/// [`connect`](Self::connect) performs the upgrade and spawns the reader
/// task that feeds the [`Handler`]. Sends from any number of tasks are
/// serialized so frames never interleave on the wire.
pub struct WebSocketClient<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for WebSocketClient<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> std::fmt::Debug for WebSocketClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("resource", &self.shared.request.resource())
            .field("state", &*lock(&self.shared.state))
            .finish_non_exhaustive()
    }
}

impl<S> WebSocketClient<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Prepare a client for `resource` on `host` over an already connected
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Random` if the handshake key could not be generated.
    pub fn new(stream: S, host: &str, resource: &str, config: Config) -> Result<Self> {
        let request = ClientHandshake::new(host, resource)?;
        Ok(Self::with_handshake(stream, request, config))
    }

    /// Prepare a client that sends `request` as its upgrade request.
    pub fn with_handshake(stream: S, request: ClientHandshake, config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                request,
                state: Mutex::new(ConnectionState::NotConnected),
                stream: Mutex::new(Some(stream)),
                writer: AsyncMutex::new(None),
                started: AtomicBool::new(false),
                last_pong: Mutex::new(Instant::now()),
                close_reason: Mutex::new(None),
                shutdown: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// When the last pong arrived, or when the client was created if none has.
    #[must_use]
    pub fn last_pong(&self) -> Instant {
        *lock(&self.shared.last_pong)
    }

    #[must_use]
    pub fn client_handshake(&self) -> &ClientHandshake {
        &self.shared.request
    }

    /// Start the connection: send the upgrade request and spawn the reader
    /// task that delivers events to `handler`.
    ///
    /// The returned handle completes after `on_close` has run.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyConnected` on a second call; a client is not reusable
    /// - `Error::ConnectionClosed` if the client was closed before connecting
    pub fn connect<H: Handler>(&self, handler: H) -> Result<JoinHandle<()>> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyConnected);
        }
        let stream = lock(&self.shared.stream)
            .take()
            .ok_or(Error::ConnectionClosed)?;
        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(run(shared, stream, handler)))
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// `Error::NotConnected` unless the connection is open, or the write error.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.send_frame(Frame::text(text.into())).await
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// `Error::NotConnected` unless the connection is open, or the write error.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_frame(Frame::binary(data)).await
    }

    /// Send a ping; the answer shows up in [`last_pong`](Self::last_pong).
    ///
    /// # Errors
    ///
    /// `Error::ControlFrameTooLarge` for payloads over 125 bytes,
    /// `Error::NotConnected` unless the connection is open.
    pub async fn ping(&self, data: impl Into<Bytes>) -> Result<()> {
        let frame = Frame::ping(data);
        frame.validate()?;
        self.send_frame(frame).await
    }

    async fn send_frame(&self, frame: Frame) -> Result<()> {
        if !self.state().can_send() {
            return Err(Error::NotConnected);
        }
        self.shared.write_frame(&frame).await
    }

    /// Close with the default reason.
    pub async fn close(&self) {
        self.close_with_reason(STOPPED_BY_CLIENT).await;
    }

    /// Request shutdown. `reason` is what `on_close` will report.
    ///
    /// Closing a connection that is already closing or closed does nothing.
    /// A client that never connected is closed immediately and releases its
    /// stream without any handler calls.
    pub async fn close_with_reason(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let started = self.shared.started.load(Ordering::SeqCst);
        let previous = {
            let mut state = lock(&self.shared.state);
            let previous = *state;
            let next = if started {
                ConnectionState::Closing
            } else {
                ConnectionState::Closed
            };
            if !state.advance(next) {
                return;
            }
            *lock(&self.shared.close_reason) = Some(reason.clone());
            previous
        };
        debug!(%previous, reason, "close requested");

        if previous == ConnectionState::Open {
            let close = CloseFrame::new(CloseCode::Normal, reason);
            self.shared.send_close(Some(&close)).await;
        }
        if !started {
            lock(&self.shared.stream).take();
        }
        self.shared.shutdown.notify_one();
    }
}

/// Per-connection protocol state, owned by the reader task.
struct Session {
    decoder: FrameDecoder,
    assembler: MessageAssembler,
}

impl Session {
    fn new(config: &Config) -> Self {
        Self {
            decoder: FrameDecoder::new(config.limits.clone()),
            assembler: MessageAssembler::new(config.limits.clone()),
        }
    }

    fn reset(&mut self) {
        self.decoder.reset();
        self.assembler.reset();
    }

    /// Run the connection until it ends; returns the close reason.
    async fn drive<S, H>(
        &mut self,
        shared: &Shared<S>,
        reader: &mut ReadHalf<S>,
        handler: &mut H,
    ) -> Result<String>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        H: Handler,
    {
        shared.write_raw(&shared.request.to_bytes()).await?;

        let mut buf = vec![0u8; shared.config.read_buffer_size];
        let mut pending = BytesMut::new();
        let response = loop {
            let Some(n) = shared.read(reader, &mut buf).await? else {
                return Ok(shared.requested_reason());
            };
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            pending.extend_from_slice(&buf[..n]);
            match ServerHandshake::parse(&pending) {
                Ok((response, consumed)) => {
                    pending.advance(consumed);
                    break response;
                }
                Err(Error::IncompleteHandshake) => {
                    shared.config.limits.check_handshake_size(pending.len())?;
                }
                Err(err) => return Err(err),
            }
        };

        if validate_response(&shared.request, &response) == HandshakeState::NotMatched {
            return Err(Error::HandshakeMismatch(format!(
                "{} {} did not complete the upgrade",
                response.status(),
                response.status_text()
            )));
        }
        if !shared.advance(ConnectionState::Open) {
            return Ok(shared.requested_reason());
        }
        info!(resource = shared.request.resource(), "connection open");
        handler.on_open(&shared.request, &response).await;

        // Frames may arrive in the same read as the handshake response.
        if !pending.is_empty() {
            if let Some(reason) = self.process(shared, handler, &pending).await? {
                return Ok(reason);
            }
        }

        loop {
            let Some(n) = shared.read(reader, &mut buf).await? else {
                return Ok(shared.requested_reason());
            };
            if n == 0 {
                return Ok(CLOSED_BY_PEER.to_string());
            }
            if let Some(reason) = self.process(shared, handler, &buf[..n]).await? {
                return Ok(reason);
            }
        }
    }

    /// Feed one chunk through decoder and assembler and dispatch the results.
    /// Returns the close reason once the connection should end.
    async fn process<S, H>(
        &mut self,
        shared: &Shared<S>,
        handler: &mut H,
        chunk: &[u8],
    ) -> Result<Option<String>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        H: Handler,
    {
        let (frames, violation) = self.decoder.decode_until_error(chunk);
        for frame in frames {
            if shared.state() != ConnectionState::Open {
                return Ok(Some(shared.requested_reason()));
            }
            let Some(message) = self.assembler.push(frame)? else {
                continue;
            };
            match message {
                Message::Text(text) => handler.on_message(text).await,
                Message::Binary(data) => handler.on_binary(data).await,
                Message::Ping(data) => shared.write_frame(&Frame::pong(data)).await?,
                Message::Pong(_) => {
                    *lock(&shared.last_pong) = Instant::now();
                    trace!("pong received");
                }
                Message::Close(close) => {
                    let reason = match &close {
                        Some(frame) if !frame.reason.is_empty() => frame.reason.clone(),
                        Some(frame) => format!("Closed by server with code {}", frame.code.as_u16()),
                        None => "Closed by server".to_string(),
                    };
                    debug!(reason, "close frame received");
                    if shared.advance(ConnectionState::Closing) {
                        let echo = close.filter(|frame| !frame.code.is_reserved());
                        shared.send_close(echo.as_ref()).await;
                    }
                    return Ok(Some(reason));
                }
            }
        }
        match violation {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

async fn run<S, H>(shared: Arc<Shared<S>>, stream: S, mut handler: H)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Handler,
{
    let (mut reader, writer) = tokio::io::split(stream);
    *shared.writer.lock().await = Some(writer);
    let mut session = Session::new(&shared.config);

    let reason = match session.drive(&shared, &mut reader, &mut handler).await {
        Ok(reason) => reason,
        Err(err) => {
            error!(error = %err, "connection failed");
            handler.on_error(&err).await;
            if shared.state() == ConnectionState::Open && shared.advance(ConnectionState::Closing) {
                let close = CloseFrame::new(err.close_code(), err.to_string());
                shared.send_close(Some(&close)).await;
            }
            err.to_string()
        }
    };

    shared.finish().await;
    session.reset();
    drop(reader);
    info!(reason, "connection closed");
    handler.on_close(reason).await;
}
