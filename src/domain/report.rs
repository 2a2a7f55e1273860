//! Valuation report pre-calculation.
//!
//! Joins a model snapshot with live prices, market metadata and currency
//! rates into per-position rows and summed totals. Rows that any filter
//! predicate rejects never reach the totals.

use std::collections::{HashMap, HashSet};
use std::iter::Sum;
use std::ops::Add;

use tracing::warn;

use crate::domain::market::{CurrencyId, MarketId};
use crate::domain::portfolio::Portfolio;
use crate::domain::sector::MAX_SECTORS;
use crate::domain::sref::SRef;
use crate::domain::stalker::StalkerData;
use crate::ports::market_meta_port::MarketMetaPort;
use crate::ports::price_port::LivePricePort;
use crate::ports::rate_port::RatePort;

/// Inclusion predicates. Every method defaults to allowing everything.
pub trait ReportFilter {
    fn allow_portfolio(&self, _name: &str) -> bool {
        true
    }

    /// Called once per sector id with the stock's field in that sector.
    fn allow_sector(&self, _sector_id: usize, _field_id: Option<usize>) -> bool {
        true
    }

    fn allow_market(&self, _market: MarketId) -> bool {
        true
    }

    fn allow_owning(&self, _owned: bool) -> bool {
        true
    }
}

pub struct AllowAll;

impl ReportFilter for AllowAll {}

/// Set based filter, `None` meaning no restriction.
#[derive(Debug, Clone, Default)]
pub struct ReportFilters {
    pub portfolios: Option<HashSet<String>>,
    pub markets: Option<HashSet<MarketId>>,
    /// Allowed field ids per sector id; an untagged stock fails a listed sector.
    pub sector_fields: HashMap<usize, HashSet<usize>>,
    pub owned_only: bool,
}

impl ReportFilter for ReportFilters {
    fn allow_portfolio(&self, name: &str) -> bool {
        self.portfolios.as_ref().is_none_or(|set| set.contains(name))
    }

    fn allow_sector(&self, sector_id: usize, field_id: Option<usize>) -> bool {
        match self.sector_fields.get(&sector_id) {
            None => true,
            Some(fields) => field_id.is_some_and(|f| fields.contains(&f)),
        }
    }

    fn allow_market(&self, market: MarketId) -> bool {
        self.markets.as_ref().is_none_or(|set| set.contains(&market))
    }

    fn allow_owning(&self, owned: bool) -> bool {
        owned || !self.owned_only
    }
}

/// One followed stock in one portfolio. Money is in home currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub portfolio: String,
    pub sref: SRef,
    pub units: f64,
    pub invested: f64,
    pub market_value: Option<f64>,
    pub gain: Option<f64>,
    pub today_change: Option<f64>,
    pub realized_gain: f64,
    pub dividends: f64,
    /// `(sector name, field name)` pairs.
    pub sectors: Vec<(String, String)>,
    /// Share of the portfolio's priced market value, in percent.
    pub allocation_pct: f64,
    /// False when the price predates the market's last close.
    pub price_is_current: bool,
}

impl ReportRow {
    pub fn is_owned(&self) -> bool {
        self.units > 0.0
    }
}

/// Summed row values. Unpriced rows count as zero and are tallied in
/// `missing_prices`. `priced_invested` sums only rows with a gain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReportTotals {
    pub invested: f64,
    pub priced_invested: f64,
    pub market_value: f64,
    pub gain: f64,
    pub today_change: f64,
    pub realized_gain: f64,
    pub dividends: f64,
    pub missing_prices: usize,
}

impl From<&ReportRow> for ReportTotals {
    fn from(row: &ReportRow) -> Self {
        ReportTotals {
            invested: row.invested,
            priced_invested: if row.gain.is_some() { row.invested } else { 0.0 },
            market_value: row.market_value.unwrap_or(0.0),
            gain: row.gain.unwrap_or(0.0),
            today_change: row.today_change.unwrap_or(0.0),
            realized_gain: row.realized_gain,
            dividends: row.dividends,
            missing_prices: usize::from(row.market_value.is_none() && row.is_owned()),
        }
    }
}

impl Add for ReportTotals {
    type Output = ReportTotals;

    fn add(self, rhs: ReportTotals) -> ReportTotals {
        ReportTotals {
            invested: self.invested + rhs.invested,
            priced_invested: self.priced_invested + rhs.priced_invested,
            market_value: self.market_value + rhs.market_value,
            gain: self.gain + rhs.gain,
            today_change: self.today_change + rhs.today_change,
            realized_gain: self.realized_gain + rhs.realized_gain,
            dividends: self.dividends + rhs.dividends,
            missing_prices: self.missing_prices + rhs.missing_prices,
        }
    }
}

impl Sum for ReportTotals {
    fn sum<I: Iterator<Item = ReportTotals>>(iter: I) -> Self {
        iter.fold(ReportTotals::default(), Add::add)
    }
}

impl<'a> Sum<&'a ReportRow> for ReportTotals {
    fn sum<I: Iterator<Item = &'a ReportRow>>(iter: I) -> Self {
        iter.map(ReportTotals::from).sum()
    }
}

impl ReportTotals {
    /// Unrealized gain relative to the invested amount of priced rows, in
    /// percent.
    pub fn gain_pct(&self) -> f64 {
        if self.priced_invested <= 0.0 {
            return 0.0;
        }
        self.gain / self.priced_invested * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioReport {
    pub name: String,
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub home_currency: CurrencyId,
    pub portfolios: Vec<PortfolioReport>,
    pub totals: ReportTotals,
}

pub struct ReportPreCalculator<'a> {
    snapshot: &'a StalkerData,
    live: &'a dyn LivePricePort,
    meta: &'a dyn MarketMetaPort,
    rates: &'a dyn RatePort,
    filter: &'a dyn ReportFilter,
    scope: Option<String>,
}

impl<'a> ReportPreCalculator<'a> {
    pub fn new(
        snapshot: &'a StalkerData,
        live: &'a dyn LivePricePort,
        meta: &'a dyn MarketMetaPort,
        rates: &'a dyn RatePort,
        filter: &'a dyn ReportFilter,
    ) -> Self {
        ReportPreCalculator {
            snapshot,
            live,
            meta,
            rates,
            filter,
            scope: None,
        }
    }

    /// Restricts the report to a single portfolio.
    pub fn with_portfolio(mut self, name: impl Into<String>) -> Self {
        self.scope = Some(name.into());
        self
    }

    fn allows(&self, sref: &SRef, owned: bool) -> bool {
        if !self.filter.allow_market(sref.market) || !self.filter.allow_owning(owned) {
            return false;
        }
        let tags = self.snapshot.stock_sectors(sref);
        (0..MAX_SECTORS).all(|sector_id| {
            let field_id = tags.and_then(|t| t.fields[sector_id]);
            self.filter.allow_sector(sector_id, field_id)
        })
    }

    fn row(&self, pf: &Portfolio, sref: &SRef) -> ReportRow {
        let units = pf.owned_units(sref);
        let invested = pf.invested_home(sref);
        let rate = self.rates.rate_to_home(self.meta.currency(sref.market));
        let bar = self.live.latest(sref);

        let (market_value, today_change, price_is_current) = match (&bar, rate) {
            (Some(bar), Some(rate)) => {
                let current = self
                    .meta
                    .last_close(sref.market)
                    .is_none_or(|close| bar.date >= close.date());
                (
                    Some(units * bar.close * rate),
                    Some(units * bar.change() * rate),
                    current,
                )
            }
            _ => {
                if units > 0.0 {
                    warn!(%sref, portfolio = %pf.name, "no price or rate, value unknown");
                }
                (None, None, false)
            }
        };

        ReportRow {
            portfolio: pf.name.clone(),
            sref: sref.clone(),
            units,
            invested,
            market_value,
            gain: market_value.map(|mv| mv - invested),
            today_change,
            realized_gain: pf.realized_gain_home(sref),
            dividends: pf.dividends_home(sref),
            sectors: self
                .snapshot
                .sector_tags(sref)
                .into_iter()
                .map(|(_, sector, field)| (sector, field))
                .collect(),
            allocation_pct: 0.0,
            price_is_current,
        }
    }

    fn portfolio_report(&self, pf: &Portfolio) -> PortfolioReport {
        let mut rows: Vec<ReportRow> = pf
            .srefs
            .iter()
            .map(|sref| self.row(pf, sref))
            .filter(|row| self.allows(&row.sref, row.is_owned()))
            .collect();
        let totals: ReportTotals = rows.iter().sum();
        if totals.market_value > 0.0 {
            for row in &mut rows {
                row.allocation_pct =
                    row.market_value.unwrap_or(0.0) / totals.market_value * 100.0;
            }
        }
        PortfolioReport {
            name: pf.name.clone(),
            rows,
            totals,
        }
    }

    pub fn calculate(&self) -> Report {
        let portfolios: Vec<PortfolioReport> = self
            .snapshot
            .portfolios
            .iter()
            .filter(|pf| self.scope.as_ref().is_none_or(|scope| &pf.name == scope))
            .filter(|pf| self.filter.allow_portfolio(&pf.name))
            .map(|pf| self.portfolio_report(pf))
            .collect();
        let totals = portfolios.iter().map(|p| p.totals).sum();
        Report {
            home_currency: self.rates.home_currency(),
            portfolios,
            totals,
        }
    }
}
