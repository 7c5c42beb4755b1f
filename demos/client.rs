//! Echo session against a plain WebSocket server.
//!
//! Run with: cargo run --example client -- ws://127.0.0.1:9001/
//! Set `RUST_LOG=wsbook=debug` to see the connection lifecycle.

use std::error::Error;

use tracing_subscriber::EnvFilter;
use wsbook::{ChannelHandler, Config, Event, transport};

const DEFAULT_URL: &str = "ws://127.0.0.1:9001/";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    println!("Connecting to {url}");

    let client = transport::connect(&url, Config::client()).await?;
    let (handler, mut events) = ChannelHandler::new();
    let task = client.connect(handler)?;

    let messages = ["Hello, WebSocket!", "second message", "bye"];
    let mut replies = 0;
    while let Some(event) = events.recv().await {
        match event {
            Event::Open(response) => {
                println!("Upgraded: {} {}", response.status(), response.status_text());
                for message in messages {
                    client.send(message).await?;
                    println!("Sent: {message}");
                }
            }
            Event::Text(text) => {
                println!("Received: {text}");
                replies += 1;
                if replies == messages.len() {
                    client.close().await;
                }
            }
            Event::Binary(data) => println!("Received {} bytes", data.len()),
            Event::Error(err) => eprintln!("Error: {err}"),
            Event::Close(reason) => println!("Closed: {reason}"),
        }
    }

    task.await?;
    Ok(())
}
