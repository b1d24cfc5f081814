//! Long-only position tracking per asset.
//!
//! Slots are indexed by universe position so that iteration (and therefore
//! floating-point summation in equity) always follows universe order.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub asset: String,
    pub size: u64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size as f64 * (price - self.entry_price)
    }
}

/// A completed round trip, net of entry and exit commission.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub asset: String,
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionBook {
    slots: Vec<Option<Position>>,
}

impl PositionBook {
    /// All-flat book with one slot per universe asset.
    pub fn new(asset_count: usize) -> Self {
        PositionBook {
            slots: vec![None; asset_count],
        }
    }

    pub fn size(&self, index: usize) -> u64 {
        self.get(index).map_or(0, |p| p.size)
    }

    pub fn get(&self, index: usize) -> Option<&Position> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn is_long(&self, index: usize) -> bool {
        self.size(index) > 0
    }

    /// Opens a position in a flat slot. Returns `false` (and changes nothing)
    /// when the slot is already long or `position.size` is zero.
    pub fn open(&mut self, index: usize, position: Position) -> bool {
        if position.size == 0 {
            return false;
        }
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(position);
                true
            }
            _ => false,
        }
    }

    /// Flattens the slot, handing back what was held.
    pub fn close(&mut self, index: usize) -> Option<Position> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// `(index, size)` for every slot in universe order, flat slots included.
    pub fn sizes(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i, slot.as_ref().map_or(0, |p| p.size)))
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
