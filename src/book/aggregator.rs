//! Merging all feed books into one view.

use std::fmt;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::trace;

use super::feed::FeedBook;
use super::levels::{PriceLevels, Side};
use crate::lock;

/// Quantities summed per price across every feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedBook {
    pub bids: PriceLevels,
    pub asks: PriceLevels,
}

impl MergedBook {
    /// Highest bid.
    #[must_use]
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.highest()
    }

    /// Lowest ask.
    #[must_use]
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.lowest()
    }

    /// Both sides have at least one level.
    #[must_use]
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

fn write_level(f: &mut fmt::Formatter<'_>, level: Option<(Decimal, Decimal)>) -> fmt::Result {
    match level {
        Some((price, quantity)) => write!(f, "[{price}, {quantity}]"),
        None => f.write_str("-"),
    }
}

impl fmt::Display for MergedBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "asks:")?;
        for (price, quantity) in self.asks.iter().rev() {
            writeln!(f, "  [{price}, {quantity}]")?;
        }
        writeln!(f, "bids:")?;
        for (price, quantity) in self.bids.iter().rev() {
            writeln!(f, "  [{price}, {quantity}]")?;
        }
        f.write_str("best bid: ")?;
        write_level(f, self.best_bid())?;
        f.write_str("\nbest ask: ")?;
        write_level(f, self.best_ask())
    }
}

/// Owns the feed books and publishes the merged book whenever one changes.
#[derive(Debug)]
pub struct Aggregator {
    feeds: Mutex<Vec<Arc<FeedBook>>>,
    tx: watch::Sender<MergedBook>,
}

impl Default for Aggregator {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(MergedBook::default());
        Self {
            feeds: Mutex::new(Vec::new()),
            tx,
        }
    }
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new, empty feed book.
    pub fn add_feed(&self, name: &str) -> Arc<FeedBook> {
        let book = Arc::new(FeedBook::new(name));
        lock(&self.feeds).push(Arc::clone(&book));
        book
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MergedBook> {
        self.tx.subscribe()
    }

    /// Most recently published book.
    #[must_use]
    pub fn snapshot(&self) -> MergedBook {
        self.tx.borrow().clone()
    }

    /// Rebuild the merged book from every feed and publish it.
    ///
    /// Aggregations are serialized, so a published book never goes back to
    /// an older state than one already sent.
    pub fn aggregate(&self) -> MergedBook {
        let feeds = lock(&self.feeds);
        let mut merged = MergedBook::default();
        for feed in feeds.iter() {
            feed.merge_side(Side::Bid, &mut merged.bids);
            feed.merge_side(Side::Ask, &mut merged.asks);
        }
        trace!(
            feeds = feeds.len(),
            bids = merged.bids.len(),
            asks = merged.asks.len(),
            "book aggregated"
        );
        self.tx.send_replace(merged.clone());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::LevelUpdate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sums_across_feeds() {
        let aggregator = Aggregator::new();
        let a = aggregator.add_feed("a");
        let b = aggregator.add_feed("b");
        a.apply(&LevelUpdate::new(Side::Bid, dec!(100), dec!(1)));
        b.apply(&LevelUpdate::new(Side::Bid, dec!(100), dec!(2)));
        b.apply(&LevelUpdate::new(Side::Bid, dec!(99), dec!(5)));
        a.apply(&LevelUpdate::new(Side::Ask, dec!(101), dec!(1)));
        b.apply(&LevelUpdate::new(Side::Ask, dec!(102), dec!(4)));

        let merged = aggregator.aggregate();
        assert_eq!(merged.bids.get(&dec!(100)), Some(dec!(3)));
        assert_eq!(merged.best_bid(), Some((dec!(100), dec!(3))));
        assert_eq!(merged.best_ask(), Some((dec!(101), dec!(1))));
        assert!(merged.is_two_sided());
    }

    #[test]
    fn test_removal_is_reflected_on_next_aggregate() {
        let aggregator = Aggregator::new();
        let feed = aggregator.add_feed("a");
        feed.apply(&LevelUpdate::new(Side::Ask, dec!(5), dec!(1)));
        assert_eq!(aggregator.aggregate().asks.len(), 1);

        feed.apply(&LevelUpdate::remove(Side::Ask, dec!(5)));
        assert!(aggregator.aggregate().asks.is_empty());
    }

    #[tokio::test]
    async fn test_publishes_on_watch_channel() {
        let aggregator = Aggregator::new();
        let mut rx = aggregator.subscribe();
        let feed = aggregator.add_feed("a");
        feed.apply(&LevelUpdate::new(Side::Bid, dec!(1), dec!(1)));
        aggregator.aggregate();

        rx.changed().await.unwrap();
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.best_bid(), Some((dec!(1), dec!(1))));
        assert_eq!(aggregator.snapshot(), published);
    }

    #[test]
    fn test_display() {
        let mut book = MergedBook::default();
        assert!(book.to_string().ends_with("best bid: -\nbest ask: -"));

        book.bids.set(dec!(9), dec!(1));
        book.asks.set(dec!(10), dec!(2));
        book.asks.set(dec!(11), dec!(3));
        let text = book.to_string();
        assert!(text.starts_with("asks:\n  [11, 3]\n  [10, 2]\nbids:\n  [9, 1]\n"));
        assert!(text.contains("best bid: [9, 1]"));
        assert!(text.ends_with("best ask: [10, 2]"));
    }
}
