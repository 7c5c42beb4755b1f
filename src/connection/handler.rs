//! Callbacks a connection delivers to its consumer.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::protocol::handshake::{ClientHandshake, ServerHandshake};

/// Receives the events of one connection.
///
/// Every method is awaited on the connection's reader task, so events arrive
/// one at a time and in wire order. `on_close` is called exactly once and is
/// always the last call.
#[async_trait]
pub trait Handler: Send + 'static {
    /// The upgrade completed.
    async fn on_open(&mut self, _request: &ClientHandshake, _response: &ServerHandshake) {}

    /// A complete text message arrived.
    async fn on_message(&mut self, _text: String) {}

    /// A complete binary message arrived.
    async fn on_binary(&mut self, _data: Bytes) {}

    /// A failure ended, or is about to end, the connection.
    async fn on_error(&mut self, _error: &Error) {}

    async fn on_close(&mut self, _reason: String) {}
}

/// A connection event, as forwarded by [`ChannelHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(ServerHandshake),
    Text(String),
    Binary(Bytes),
    Error(Error),
    Close(String),
}

/// Handler that forwards every callback into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelHandler {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: Event) {
        // The receiver may be gone; events are then dropped.
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl Handler for ChannelHandler {
    async fn on_open(&mut self, _request: &ClientHandshake, response: &ServerHandshake) {
        self.emit(Event::Open(response.clone()));
    }

    async fn on_message(&mut self, text: String) {
        self.emit(Event::Text(text));
    }

    async fn on_binary(&mut self, data: Bytes) {
        self.emit(Event::Binary(data));
    }

    async fn on_error(&mut self, error: &Error) {
        self.emit(Event::Error(error.clone()));
    }

    async fn on_close(&mut self, reason: String) {
        self.emit(Event::Close(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_handler_forwards_in_order() {
        let (mut handler, mut rx) = ChannelHandler::new();
        handler.on_message("a".into()).await;
        handler.on_binary(Bytes::from_static(b"b")).await;
        handler.on_error(&Error::InvalidUtf8).await;
        handler.on_close("done".into()).await;

        assert_eq!(rx.recv().await, Some(Event::Text("a".into())));
        assert_eq!(rx.recv().await, Some(Event::Binary(Bytes::from_static(b"b"))));
        assert_eq!(rx.recv().await, Some(Event::Error(Error::InvalidUtf8)));
        assert_eq!(rx.recv().await, Some(Event::Close("done".into())));
    }

    #[tokio::test]
    async fn test_channel_handler_tolerates_dropped_receiver() {
        let (mut handler, rx) = ChannelHandler::new();
        drop(rx);
        handler.on_message("ignored".into()).await;
    }
}
