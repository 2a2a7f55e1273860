//! End-of-day price representation.

use chrono::NaiveDate;

/// Latest end-of-day bar for a stock, in market currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
}

impl PriceBar {
    /// close - prev_close, zero when the previous close is unknown.
    pub fn change(&self) -> f64 {
        if self.prev_close <= 0.0 {
            return 0.0;
        }
        self.close - self.prev_close
    }

    /// Day change in percent of the previous close.
    pub fn change_pct(&self) -> f64 {
        if self.prev_close <= 0.0 {
            return 0.0;
        }
        (self.close - self.prev_close) / self.prev_close * 100.0
    }
}

/// A single historical close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl ClosePoint {
    /// Providers report missing days as zero closes.
    pub fn is_valid(&self) -> bool {
        self.close > 0.0
    }
}
