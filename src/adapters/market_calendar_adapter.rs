//! Weekday session calendar.
//!
//! Sessions run Monday to Friday at fixed local hours; holidays are not
//! modelled. `now` is taken as local time in every market.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::domain::market::{MarketId, MarketStatus};
use crate::ports::market_meta_port::MarketMetaPort;

fn hm(hour: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, 0).unwrap_or(NaiveTime::MIN)
}

/// Local opening and closing time of a market.
pub fn session(market: MarketId) -> (NaiveTime, NaiveTime) {
    match market {
        MarketId::Nasdaq | MarketId::Nyse | MarketId::Amex | MarketId::Tsx => (hm(9, 30), hm(16, 0)),
        MarketId::Omxh | MarketId::Omxsto | MarketId::Omxc => (hm(10, 0), hm(18, 30)),
        MarketId::Xetra => (hm(9, 0), hm(17, 30)),
        MarketId::Lse => (hm(8, 0), hm(16, 30)),
    }
}

fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub struct MarketCalendarAdapter {
    now: NaiveDateTime,
    active: Vec<MarketId>,
}

impl MarketCalendarAdapter {
    pub fn new(now: NaiveDateTime, active: Vec<MarketId>) -> Self {
        Self { now, active }
    }

    pub fn from_clock(active: Vec<MarketId>) -> Self {
        Self::new(chrono::Local::now().naive_local(), active)
    }
}

impl MarketMetaPort for MarketCalendarAdapter {
    fn active_markets(&self) -> Vec<MarketId> {
        self.active.clone()
    }

    fn last_close(&self, market: MarketId) -> Option<NaiveDateTime> {
        let (_, close) = session(market);
        let mut date = self.now.date();
        if !(is_trading_day(date) && self.now.time() >= close) {
            date -= Duration::days(1);
        }
        // at most two weekend days to skip
        for _ in 0..3 {
            if is_trading_day(date) {
                return Some(date.and_time(close));
            }
            date -= Duration::days(1);
        }
        None
    }

    fn status(&self, market: MarketId) -> MarketStatus {
        if !self.active.contains(&market) {
            return MarketStatus::Unknown;
        }
        let (open, close) = session(market);
        let time = self.now.time();
        if is_trading_day(self.now.date()) && time >= open && time < close {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }
}
