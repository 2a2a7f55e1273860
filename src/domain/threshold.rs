//! Holding cost basis crossing scan.
//!
//! Compares the latest close and the recent close history of a stock against
//! two cost bases per portfolio: the weighted average cost of the active
//! holdings and the cost of the oldest active holding. A crossing is reported
//! when only the latest bar sits on the far side of the cost.
//!
//! Every bar in the window is converted with the current rate, not the rate
//! of its own date.

use tracing::{debug, warn};

use crate::domain::config_validation::{MAX_LOOKBACK, MIN_LOOKBACK};
use crate::domain::error::StalkerError;
use crate::domain::event_record::{EventRecord, EventType};
use crate::domain::holding::Holding;
use crate::domain::portfolio::Portfolio;
use crate::domain::price_bar::{ClosePoint, PriceBar};
use crate::domain::sref::SRef;
use crate::domain::stalker::StalkerData;
use crate::ports::event_sink_port::EventSinkPort;
use crate::ports::market_meta_port::MarketMetaPort;
use crate::ports::price_port::{LivePricePort, PriceHistoryPort};
use crate::ports::rate_port::RatePort;

pub const DEFAULT_LOOKBACK: usize = 10;

/// Rejects a lookback period outside `MIN_LOOKBACK..=MAX_LOOKBACK`.
pub fn check_period(period: usize) -> Result<usize, StalkerError> {
    match i64::try_from(period) {
        Ok(value) if (MIN_LOOKBACK..=MAX_LOOKBACK).contains(&value) => Ok(period),
        _ => Err(StalkerError::InvalidValue {
            field: "period".into(),
            value: period.to_string(),
            reason: format!("must be between {MIN_LOOKBACK} and {MAX_LOOKBACK}"),
        }),
    }
}

/// Minimum number of valid closes a window of `period` bars needs.
pub fn min_valid_closes(period: usize) -> usize {
    period / 2 + 1
}

/// Quantity weighted home-currency cost per unit of the active holdings.
pub fn average_cost(holdings: &[&Holding]) -> Option<f64> {
    let units: f64 = holdings.iter().map(|h| h.remaining_units).sum();
    if units <= 0.0 {
        return None;
    }
    let cost: f64 = holdings.iter().map(|h| h.remaining_invested_home()).sum();
    Some(cost / units)
}

/// Cost per unit of the earliest purchase, ties going to the first added.
pub fn oldest_cost(holdings: &[&Holding]) -> Option<f64> {
    holdings
        .iter()
        .min_by_key(|h| h.purchase_date)
        .map(|h| h.price_with_fee_home())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crossing {
    Down,
    Up,
}

/// Closes in home currency, with the latest bar last.
fn crossing(closes: &[f64], cost: f64) -> Option<Crossing> {
    let latest = *closes.last()?;
    if latest < cost && closes.iter().filter(|c| **c < cost).count() == 1 {
        Some(Crossing::Down)
    } else if latest >= cost && closes.iter().filter(|c| **c >= cost).count() == 1 {
        Some(Crossing::Up)
    } else {
        None
    }
}

pub struct HoldingThresholdAnalyzer<'a> {
    history: &'a dyn PriceHistoryPort,
    rates: &'a dyn RatePort,
    meta: &'a dyn MarketMetaPort,
}

impl<'a> HoldingThresholdAnalyzer<'a> {
    pub fn new(
        history: &'a dyn PriceHistoryPort,
        rates: &'a dyn RatePort,
        meta: &'a dyn MarketMetaPort,
    ) -> Self {
        HoldingThresholdAnalyzer {
            history,
            rates,
            meta,
        }
    }

    /// The last `period - 1` history closes before `latest`, followed by `latest`.
    fn window(&self, sref: &SRef, period: usize, latest: &PriceBar) -> Option<Vec<ClosePoint>> {
        let history = self.history.last_closes(sref, period)?;
        let mut window: Vec<ClosePoint> = history
            .into_iter()
            .filter(|p| p.date < latest.date)
            .collect();
        let keep = period.saturating_sub(1);
        if window.len() > keep {
            window.drain(..window.len() - keep);
        }
        window.push(ClosePoint {
            date: latest.date,
            close: latest.close,
        });
        Some(window)
    }

    /// Scans one stock and pushes crossing events to `sink`. Returns the
    /// number of events emitted.
    pub fn evaluate(
        &self,
        sref: &SRef,
        period: usize,
        latest: &PriceBar,
        snapshot: &StalkerData,
        sink: &mut dyn EventSinkPort,
    ) -> usize {
        if check_period(period).is_err() {
            debug!(%sref, period, "lookback period out of range");
            return 0;
        }
        if latest.close <= 0.0 {
            debug!(%sref, "no valid latest close");
            return 0;
        }
        let Some(window) = self.window(sref, period, latest) else {
            debug!(%sref, "no price history");
            return 0;
        };
        let valid: Vec<f64> = window
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| p.close)
            .collect();
        if valid.len() < min_valid_closes(period) {
            debug!(%sref, valid = valid.len(), period, "not enough closes");
            return 0;
        }

        let currency = self.meta.currency(sref.market);
        let Some(rate) = self.rates.rate_to_home(currency) else {
            warn!(%sref, %currency, "no rate to home currency, skipping");
            return 0;
        };
        let closes: Vec<f64> = valid.iter().map(|c| c * rate).collect();
        let latest_home = latest.close * rate;

        let mut emitted = 0;
        for pf in &snapshot.portfolios {
            for (event_type, cost) in cost_bases(pf, sref) {
                let Some(direction) = crossing(&closes, cost) else {
                    continue;
                };
                let event_type = match (event_type, direction) {
                    (CostBasis::Average, Crossing::Down) => EventType::HoldingAvgCrossedDown,
                    (CostBasis::Average, Crossing::Up) => EventType::HoldingAvgCrossedUp,
                    (CostBasis::Oldest, Crossing::Down) => EventType::HoldingOldestCrossedDown,
                    (CostBasis::Oldest, Crossing::Up) => EventType::HoldingOldestCrossedUp,
                };
                sink.push(EventRecord::holding_event(
                    event_type,
                    latest.date,
                    &pf.name,
                    sref,
                    cost,
                    latest_home,
                ));
                emitted += 1;
            }
        }
        emitted
    }

    /// Evaluates every followed stock that has a live price.
    pub fn scan(
        &self,
        period: usize,
        live: &dyn LivePricePort,
        snapshot: &StalkerData,
        sink: &mut dyn EventSinkPort,
    ) -> usize {
        let mut emitted = 0;
        for sref in snapshot.followed_srefs() {
            match live.latest(&sref) {
                Some(latest) => emitted += self.evaluate(&sref, period, &latest, snapshot, sink),
                None => warn!(%sref, "no latest price, skipping"),
            }
        }
        emitted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostBasis {
    Average,
    Oldest,
}

fn cost_bases(pf: &Portfolio, sref: &SRef) -> Vec<(CostBasis, f64)> {
    let active: Vec<&Holding> = pf.active_holdings(sref).collect();
    let mut bases = Vec::new();
    if let Some(avg) = average_cost(&active) {
        bases.push((CostBasis::Average, avg));
    }
    if active.len() > 1 {
        if let Some(oldest) = oldest_cost(&active) {
            bases.push((CostBasis::Oldest, oldest));
        }
    }
    bases
}
