//! Market metadata port.

use chrono::NaiveDateTime;

use crate::domain::market::{CurrencyId, MarketId, MarketStatus};

pub trait MarketMetaPort {
    fn active_markets(&self) -> Vec<MarketId>;

    /// Local date and time of the most recent session close.
    fn last_close(&self, market: MarketId) -> Option<NaiveDateTime>;

    fn status(&self, market: MarketId) -> MarketStatus;

    fn currency(&self, market: MarketId) -> CurrencyId {
        market.currency()
    }
}
