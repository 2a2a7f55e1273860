//! Price data ports.

use crate::domain::price_bar::{ClosePoint, PriceBar};
use crate::domain::sref::SRef;

/// Historical closes, oldest first.
pub trait PriceHistoryPort {
    /// The last `count` closes, or `None` when there is no current data
    /// for the stock.
    fn last_closes(&self, sref: &SRef, count: usize) -> Option<Vec<ClosePoint>>;
}

/// Latest price bar per stock.
pub trait LivePricePort {
    fn latest(&self, sref: &SRef) -> Option<PriceBar>;
}
