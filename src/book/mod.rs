//! Order-book consumer: exchange feeds decoded into per-feed books and merged
//! into one view.
//!
//! Each exchange connection runs a [`FeedHandler`] that subscribes once the
//! upgrade completes, decodes every text message with its [`FeedDecoder`] and
//! applies the resulting [`LevelUpdate`]s to its own [`FeedBook`]. After each
//! applied message the shared [`Aggregator`] rebuilds the [`MergedBook`] and
//! publishes it on a watch channel.

mod aggregator;
mod bitfinex;
mod feed;
mod kraken;
mod levels;

pub use aggregator::{Aggregator, MergedBook};
pub use bitfinex::BitfinexDecoder;
pub use feed::{FeedBook, FeedDecoder, FeedHandler, start_feed};
pub use kraken::KrakenDecoder;
pub use levels::{LevelUpdate, PriceLevels, Side};

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

/// Failure to turn a feed message into level updates.
#[derive(Error, Debug)]
pub enum BookError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {feed} message: {reason}")]
    Malformed { feed: &'static str, reason: String },

    #[error("invalid decimal: {0}")]
    Decimal(String),
}

impl BookError {
    pub(crate) fn malformed(feed: &'static str, reason: impl Into<String>) -> Self {
        BookError::Malformed {
            feed,
            reason: reason.into(),
        }
    }
}

/// Read a decimal that a feed sent either as a JSON string or a JSON number.
pub(crate) fn decimal(value: &Value) -> Result<Decimal, BookError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(BookError::Decimal(other.to_string())),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| BookError::Decimal(text))
}
