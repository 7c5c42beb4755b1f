//! Price levels for one side of a book.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        })
    }
}

/// A change to a single price level. A zero quantity removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl LevelUpdate {
    #[must_use]
    pub fn new(side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            side,
            price,
            quantity,
        }
    }

    #[must_use]
    pub fn remove(side: Side, price: Decimal) -> Self {
        Self::new(side, price, Decimal::ZERO)
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Price → quantity, kept sorted by price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceLevels {
    levels: BTreeMap<Decimal, Decimal>,
}

impl PriceLevels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the quantity at `price`; zero removes the level.
    pub fn set(&mut self, price: Decimal, quantity: Decimal) {
        if quantity.is_zero() {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, quantity);
        }
    }

    /// Add `quantity` to whatever is already resting at `price`.
    pub fn add(&mut self, price: Decimal, quantity: Decimal) {
        *self.levels.entry(price).or_insert(Decimal::ZERO) += quantity;
    }

    pub fn remove(&mut self, price: &Decimal) -> Option<Decimal> {
        self.levels.remove(price)
    }

    #[must_use]
    pub fn get(&self, price: &Decimal) -> Option<Decimal> {
        self.levels.get(price).copied()
    }

    #[must_use]
    pub fn highest(&self) -> Option<(Decimal, Decimal)> {
        self.levels.last_key_value().map(|(p, q)| (*p, *q))
    }

    #[must_use]
    pub fn lowest(&self) -> Option<(Decimal, Decimal)> {
        self.levels.first_key_value().map(|(p, q)| (*p, *q))
    }

    /// Levels in ascending price order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Decimal, &Decimal)> {
        self.levels.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}
