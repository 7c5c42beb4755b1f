//! Per-feed books and the connection handler that fills them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::BookError;
use super::aggregator::Aggregator;
use super::levels::{LevelUpdate, PriceLevels, Side};
use crate::config::Config;
use crate::connection::{Handler, WebSocketClient};
use crate::error::{Error, Result};
use crate::lock;
use crate::protocol::handshake::{ClientHandshake, ServerHandshake};
use crate::transport::{self, MaybeTlsStream};

/// Turns one exchange's text messages into level updates.
pub trait FeedDecoder: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// WebSocket URL of the public feed.
    fn url(&self) -> &str;

    /// Text message sent once the connection opens.
    fn subscribe_message(&self) -> String;

    /// Decode one message. Messages that carry no levels (events,
    /// heartbeats) decode to an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`BookError`] for invalid JSON or unexpected shapes.
    fn decode(&self, text: &str) -> std::result::Result<Vec<LevelUpdate>, BookError>;
}

/// Bid and ask levels of a single feed, each side behind its own lock.
#[derive(Debug, Default)]
pub struct FeedBook {
    name: String,
    bids: Mutex<PriceLevels>,
    asks: Mutex<PriceLevels>,
}

impl FeedBook {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn side(&self, side: Side) -> &Mutex<PriceLevels> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn apply(&self, update: &LevelUpdate) {
        lock(self.side(update.side)).set(update.price, update.quantity);
    }

    pub fn apply_all(&self, updates: &[LevelUpdate]) {
        for update in updates {
            self.apply(update);
        }
    }

    /// Copy of one side's levels.
    #[must_use]
    pub fn levels(&self, side: Side) -> PriceLevels {
        lock(self.side(side)).clone()
    }

    /// Add this feed's quantities into `into`, one side lock at a time.
    pub(crate) fn merge_side(&self, side: Side, into: &mut PriceLevels) {
        for (price, quantity) in lock(self.side(side)).iter() {
            into.add(*price, *quantity);
        }
    }

    pub fn clear(&self) {
        lock(&self.bids).clear();
        lock(&self.asks).clear();
    }
}

/// Connection handler for one exchange feed.
pub struct FeedHandler<D, S> {
    decoder: D,
    client: WebSocketClient<S>,
    book: Arc<FeedBook>,
    aggregator: Arc<Aggregator>,
}

impl<D, S> FeedHandler<D, S>
where
    D: FeedDecoder,
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// `client` is used to send the subscription once the connection opens.
    pub fn new(
        decoder: D,
        client: WebSocketClient<S>,
        book: Arc<FeedBook>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            decoder,
            client,
            book,
            aggregator,
        }
    }
}

#[async_trait]
impl<D, S> Handler for FeedHandler<D, S>
where
    D: FeedDecoder,
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn on_open(&mut self, _request: &ClientHandshake, _response: &ServerHandshake) {
        info!(feed = self.decoder.name(), "connected, subscribing to book");
        if let Err(err) = self.client.send(self.decoder.subscribe_message()).await {
            warn!(feed = self.decoder.name(), error = %err, "subscribe failed");
        }
    }

    async fn on_message(&mut self, text: String) {
        match self.decoder.decode(&text) {
            Ok(updates) if updates.is_empty() => {}
            Ok(updates) => {
                debug!(feed = self.decoder.name(), count = updates.len(), "applying levels");
                self.book.apply_all(&updates);
                self.aggregator.aggregate();
            }
            Err(err) => warn!(feed = self.decoder.name(), error = %err, "skipping message"),
        }
    }

    async fn on_error(&mut self, error: &Error) {
        warn!(feed = self.decoder.name(), %error, "feed connection error");
    }

    async fn on_close(&mut self, reason: String) {
        info!(feed = self.decoder.name(), reason, "feed closed");
    }
}

/// Connect to `decoder`'s feed, register its book with `aggregator` and start
/// the connection.
///
/// # Errors
///
/// Fails if the URL is invalid or the stream cannot be opened.
pub async fn start_feed<D: FeedDecoder>(
    decoder: D,
    aggregator: &Arc<Aggregator>,
    config: Config,
) -> Result<(WebSocketClient<MaybeTlsStream>, JoinHandle<()>)> {
    let client = transport::connect(decoder.url(), config).await?;
    let book = aggregator.add_feed(decoder.name());
    let handler = FeedHandler::new(decoder, client.clone(), book, Arc::clone(aggregator));
    let task = client.connect(handler)?;
    Ok((client, task))
}
