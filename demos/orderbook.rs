//! Merged Kraken + Bitfinex BTC/USD book, printed as it changes.
//!
//! Run with: cargo run --example orderbook --features tls-rustls
//! Stop with Ctrl-C.

use std::error::Error;

use tracing_subscriber::EnvFilter;
use wsbook::Config;
use wsbook::book::{Aggregator, BitfinexDecoder, KrakenDecoder, start_feed};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let aggregator = Aggregator::new();
    let mut book = aggregator.subscribe();

    let (bitfinex, bitfinex_task) =
        start_feed(BitfinexDecoder::default(), &aggregator, Config::client()).await?;
    let (kraken, kraken_task) =
        start_feed(KrakenDecoder::default(), &aggregator, Config::client()).await?;

    loop {
        tokio::select! {
            changed = book.changed() => {
                if changed.is_err() {
                    break;
                }
                let merged = book.borrow_and_update().clone();
                if merged.is_two_sided() {
                    println!("{merged}");
                    println!("***************************");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bitfinex.close().await;
    kraken.close().await;
    bitfinex_task.await?;
    kraken_task.await?;
    Ok(())
}
