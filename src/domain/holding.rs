//! Holdings (purchases) and trades (sales).

use chrono::NaiveDate;

use super::sref::SRef;

/// Tolerance when comparing unit counts.
pub const UNITS_EPSILON: f64 = 1e-9;

/// Clamps a remaining unit count to `0.0..=units`, treating float residue
/// from partial sales as fully sold.
pub fn settle_units(remaining: f64, units: f64) -> f64 {
    if remaining <= UNITS_EPSILON {
        0.0
    } else {
        remaining.min(units)
    }
}

/// One purchase of a stock. Money fields are in market currency;
/// `currency_rate` converts them to home currency at purchase time.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub sref: SRef,
    pub purchase_id: String,
    pub purchase_date: NaiveDate,
    pub units: f64,
    pub remaining_units: f64,
    pub price_per_unit: f64,
    pub fee: f64,
    pub currency_rate: f64,
    pub note: String,
}

impl Holding {
    pub fn is_active(&self) -> bool {
        self.remaining_units > UNITS_EPSILON
    }

    pub fn sold_units(&self) -> f64 {
        self.units - self.remaining_units
    }

    /// units * price * rate + fee * rate
    pub fn invested_home(&self) -> f64 {
        self.units * self.price_per_unit * self.currency_rate + self.fee * self.currency_rate
    }

    /// Home-currency cost per unit including the purchase fee.
    pub fn price_with_fee_home(&self) -> f64 {
        if self.units <= 0.0 {
            return 0.0;
        }
        self.invested_home() / self.units
    }

    /// Cost basis of the units not yet sold.
    pub fn remaining_invested_home(&self) -> f64 {
        self.remaining_units * self.price_with_fee_home()
    }
}

/// Units a trade consumed from one holding.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeAllocation {
    pub purchase_id: String,
    pub units: f64,
}

/// A realized sale.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub sref: SRef,
    pub trade_id: String,
    pub trade_date: NaiveDate,
    pub units: f64,
    pub price_per_unit: f64,
    pub fee: f64,
    pub currency_rate: f64,
    /// Originating purchase, `None` for an unlinked sale.
    pub holding_id: Option<String>,
    pub note: String,
    pub allocations: Vec<TradeAllocation>,
}

impl Trade {
    /// Sale proceeds after fee, in home currency.
    pub fn proceeds_home(&self) -> f64 {
        (self.units * self.price_per_unit - self.fee) * self.currency_rate
    }

    /// Proceeds minus the cost basis of the consumed holdings.
    pub fn realized_gain_home(&self, holdings: &[Holding]) -> f64 {
        let cost: f64 = self
            .allocations
            .iter()
            .filter_map(|a| {
                holdings
                    .iter()
                    .find(|h| h.sref == self.sref && h.purchase_id == a.purchase_id)
                    .map(|h| a.units * h.price_with_fee_home())
            })
            .sum();
        self.proceeds_home() - cost
    }
}
