//! # wsbook - RFC 6455 WebSocket client core with an order-book consumer
//!
//! `wsbook` speaks the client side of the WebSocket protocol over any
//! byte-in/byte-out duplex stream, and ships a consumer that merges the
//! public order books of several exchanges into one view.
//!
//! ## Layers
//!
//! - [`protocol`]: opening handshake, frame codec, incremental decoder and
//!   fragmented-message reassembly. Synchronous and runtime-agnostic.
//! - [`connection`]: the connection lifecycle on tokio, with a reader task
//!   that delivers events to a [`Handler`].
//! - [`transport`]: `ws://`/`wss://` URL resolution and TCP/TLS streams.
//! - [`book`]: exchange feed decoders, per-feed books and the aggregator.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsbook::{ChannelHandler, Config, Event};
//!
//! let client = wsbook::transport::connect("ws://127.0.0.1:9001/", Config::client()).await?;
//! let (handler, mut events) = ChannelHandler::new();
//! client.connect(handler)?;
//! while let Some(event) = events.recv().await {
//!     if let Event::Open(_) = event {
//!         client.send("hello").await?;
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod book;
#[cfg(feature = "async-tokio")]
pub mod transport;

pub use config::{Config, Limits};
pub use connection::ConnectionState;
#[cfg(feature = "async-tokio")]
pub use connection::{ChannelHandler, Event, Handler, WebSocketClient};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    ClientHandshake, Frame, FrameDecoder, HandshakeState, MessageAssembler, OpCode,
    ServerHandshake, WS_GUID, compute_accept_key,
};

/// Lock a std mutex, taking the guard even if a holder panicked.
#[cfg(feature = "async-tokio")]
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
