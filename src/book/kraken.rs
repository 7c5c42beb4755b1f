//! Kraken public book feed.
//!
//! Book messages are arrays whose object elements carry level lists:
//! `as`/`bs` in snapshots, `a`/`b` in updates. Each level is
//! `[price, volume, timestamp, ..]` with decimal strings; a zero volume
//! removes the level. Top-level objects are events and carry no levels.

use serde_json::Value;

use super::feed::FeedDecoder;
use super::levels::{LevelUpdate, Side};
use super::{BookError, decimal};

const NAME: &str = "kraken";
const URL: &str = "wss://ws.kraken.com";

#[derive(Debug, Clone)]
pub struct KrakenDecoder {
    pair: String,
}

impl KrakenDecoder {
    #[must_use]
    pub fn new(pair: impl Into<String>) -> Self {
        Self { pair: pair.into() }
    }
}

impl Default for KrakenDecoder {
    fn default() -> Self {
        Self::new("XBT/USD")
    }
}

fn levels(side: Side, list: &Value, out: &mut Vec<LevelUpdate>) -> Result<(), BookError> {
    let list = list
        .as_array()
        .ok_or_else(|| BookError::malformed(NAME, "level list is not an array"))?;
    for level in list {
        let fields = level
            .as_array()
            .filter(|f| f.len() >= 2)
            .ok_or_else(|| BookError::malformed(NAME, format!("bad level: {level}")))?;
        out.push(LevelUpdate::new(
            side,
            decimal(&fields[0])?,
            decimal(&fields[1])?,
        ));
    }
    Ok(())
}

impl FeedDecoder for KrakenDecoder {
    fn name(&self) -> &str {
        NAME
    }

    fn url(&self) -> &str {
        URL
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "event": "subscribe",
            "pair": [self.pair],
            "subscription": { "name": "book" },
        })
        .to_string()
    }

    fn decode(&self, text: &str) -> Result<Vec<LevelUpdate>, BookError> {
        let value: Value = serde_json::from_str(text)?;
        let elements = match value {
            Value::Object(_) => return Ok(Vec::new()),
            Value::Array(elements) => elements,
            other => return Err(BookError::malformed(NAME, format!("unexpected {other}"))),
        };

        let mut updates = Vec::new();
        for object in elements.iter().filter_map(Value::as_object) {
            for (key, list) in object {
                match key.as_str() {
                    "a" | "as" => levels(Side::Ask, list, &mut updates)?,
                    "b" | "bs" => levels(Side::Bid, list, &mut updates)?,
                    _ => {}
                }
            }
        }
        Ok(updates)
    }
}
