//! Client connection lifecycle.
//!
//! A [`WebSocketClient`] wraps a connected byte stream. Calling `connect`
//! sends the upgrade request and spawns one reader task, which decodes
//! inbound frames and reports events to a [`Handler`]:
//!
//! ```rust,ignore
//! use wsbook::{ChannelHandler, Config, WebSocketClient};
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9001").await?;
//! let client = WebSocketClient::new(stream, "127.0.0.1:9001", "/", Config::client())?;
//! let (handler, mut events) = ChannelHandler::new();
//! let reader = client.connect(handler)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod state;

pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
mod client;
#[cfg(feature = "async-tokio")]
mod handler;

#[cfg(feature = "async-tokio")]
pub use client::WebSocketClient;
#[cfg(feature = "async-tokio")]
pub use handler::{ChannelHandler, Event, Handler};
