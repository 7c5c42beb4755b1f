//! Bitfinex v2 public book feed.
//!
//! Channel messages are `[chan_id, payload]`. The payload is `"hb"` for a
//! heartbeat, a list of `[price, count, amount]` entries for a snapshot, or a
//! single entry for an update. A positive amount is a bid and a negative one
//! an ask; a count of zero removes the level.

use rust_decimal::Decimal;
use serde_json::Value;

use super::feed::FeedDecoder;
use super::levels::{LevelUpdate, Side};
use super::{BookError, decimal};

const NAME: &str = "bitfinex";
const URL: &str = "wss://api-pub.bitfinex.com/ws/2";
const HEARTBEAT: &str = "hb";

#[derive(Debug, Clone)]
pub struct BitfinexDecoder {
    symbol: String,
}

impl BitfinexDecoder {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl Default for BitfinexDecoder {
    fn default() -> Self {
        Self::new("tBTCUSD")
    }
}

fn entry(value: &Value) -> Result<Option<LevelUpdate>, BookError> {
    let fields = value
        .as_array()
        .filter(|f| f.len() >= 3)
        .ok_or_else(|| BookError::malformed(NAME, format!("bad entry: {value}")))?;
    let price = decimal(&fields[0])?;
    let count = fields[1]
        .as_u64()
        .ok_or_else(|| BookError::malformed(NAME, format!("bad count: {}", fields[1])))?;
    let amount = decimal(&fields[2])?;

    let side = if amount > Decimal::ZERO {
        Side::Bid
    } else if amount < Decimal::ZERO {
        Side::Ask
    } else {
        return Ok(None);
    };
    let quantity = if count == 0 { Decimal::ZERO } else { amount.abs() };
    Ok(Some(LevelUpdate::new(side, price, quantity)))
}

impl FeedDecoder for BitfinexDecoder {
    fn name(&self) -> &str {
        NAME
    }

    fn url(&self) -> &str {
        URL
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "event": "subscribe",
            "channel": "book",
            "symbol": self.symbol,
        })
        .to_string()
    }

    fn decode(&self, text: &str) -> Result<Vec<LevelUpdate>, BookError> {
        let value: Value = serde_json::from_str(text)?;
        let message = match value {
            Value::Object(_) => return Ok(Vec::new()),
            Value::Array(message) => message,
            other => return Err(BookError::malformed(NAME, format!("unexpected {other}"))),
        };

        let payload = message
            .get(1)
            .ok_or_else(|| BookError::malformed(NAME, "missing payload"))?;
        let entries = match payload {
            Value::String(s) if s == HEARTBEAT => return Ok(Vec::new()),
            Value::Array(entries) => entries,
            other => return Err(BookError::malformed(NAME, format!("unexpected payload {other}"))),
        };

        if entries.first().is_some_and(Value::is_array) {
            let mut updates = Vec::with_capacity(entries.len());
            for value in entries {
                updates.extend(entry(value)?);
            }
            Ok(updates)
        } else if entries.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(entry(payload)?.into_iter().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_splits_sides_by_amount_sign() {
        let text = "[17082,[[7254.7,3,3.3],[7254.5,1,-0.25],[7254.4,2,0.5]]]";
        let updates = BitfinexDecoder::default().decode(text).unwrap();
        assert_eq!(
            updates,
            vec![
                LevelUpdate::new(Side::Bid, dec!(7254.7), dec!(3.3)),
                LevelUpdate::new(Side::Ask, dec!(7254.5), dec!(0.25)),
                LevelUpdate::new(Side::Bid, dec!(7254.4), dec!(0.5)),
            ]
        );
    }

    #[test]
    fn test_single_update() {
        let text = "[17082,[7254.5,2,-1.1]]";
        let updates = BitfinexDecoder::default().decode(text).unwrap();
        assert_eq!(
            updates,
            vec![LevelUpdate::new(Side::Ask, dec!(7254.5), dec!(1.1))]
        );
    }

    #[test]
    fn test_zero_count_removes() {
        let decoder = BitfinexDecoder::default();
        let bid = decoder.decode("[17082,[7254.7,0,1]]").unwrap();
        assert_eq!(bid, vec![LevelUpdate::remove(Side::Bid, dec!(7254.7))]);
        let ask = decoder.decode("[17082,[7254.8,0,-1]]").unwrap();
        assert_eq!(ask, vec![LevelUpdate::remove(Side::Ask, dec!(7254.8))]);
    }

    #[test]
    fn test_heartbeat_and_events_ignored() {
        let decoder = BitfinexDecoder::default();
        assert!(decoder.decode(r#"[17082,"hb"]"#).unwrap().is_empty());
        assert!(
            decoder
                .decode(r#"{"event":"subscribed","channel":"book","chanId":17082}"#)
                .unwrap()
                .is_empty()
        );
        assert!(decoder.decode("[17082,[]]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_input() {
        let decoder = BitfinexDecoder::default();
        assert!(matches!(decoder.decode("[17082]"), Err(BookError::Malformed { .. })));
        assert!(matches!(
            decoder.decode("[17082,[7254.5,2]]"),
            Err(BookError::Malformed { .. })
        ));
        assert!(matches!(decoder.decode("[1,"), Err(BookError::Json(_))));
    }

    #[test]
    fn test_subscribe_message() {
        let message = BitfinexDecoder::new("tETHUSD").subscribe_message();
        let value: Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["channel"], "book");
        assert_eq!(value["symbol"], "tETHUSD");
    }
}
