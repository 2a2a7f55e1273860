//! Portfolio and its owned records: orders and dividends.

use chrono::NaiveDate;
use strum::{Display, EnumString};

use super::holding::{Holding, Trade};
use super::sref::SRef;

/// Prices are keyed with this tolerance (orders are addressed by price).
pub const PRICE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Pending buy/sell intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: OrderSide,
    pub sref: SRef,
    pub units: f64,
    pub price: f64,
    pub last_date: NaiveDate,
    pub fill_date: Option<NaiveDate>,
}

impl Order {
    pub fn matches(&self, side: OrderSide, sref: &SRef, price: f64) -> bool {
        self.side == side && &self.sref == sref && (self.price - price).abs() < PRICE_EPSILON
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.fill_date.is_none() && self.last_date < today
    }

    /// Filled or expired orders no longer change.
    pub fn is_terminal(&self, today: NaiveDate) -> bool {
        self.fill_date.is_some() || self.is_expired(today)
    }
}

/// Dividend payment against a position, not tied to a single holding.
#[derive(Debug, Clone, PartialEq)]
pub struct Dividend {
    pub sref: SRef,
    pub ex_div_date: NaiveDate,
    pub payment_date: NaiveDate,
    pub units: f64,
    pub payment_per_unit: f64,
    pub currency_rate: f64,
}

impl Dividend {
    pub fn total_home(&self) -> f64 {
        self.units * self.payment_per_unit * self.currency_rate
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub name: String,
    pub srefs: Vec<SRef>,
    pub holdings: Vec<Holding>,
    pub trades: Vec<Trade>,
    pub orders: Vec<Order>,
    pub dividends: Vec<Dividend>,
}

impl Portfolio {
    pub fn new(name: &str) -> Self {
        Portfolio {
            name: name.to_string(),
            srefs: Vec::new(),
            holdings: Vec::new(),
            trades: Vec::new(),
            orders: Vec::new(),
            dividends: Vec::new(),
        }
    }

    pub fn follows(&self, sref: &SRef) -> bool {
        self.srefs.contains(sref)
    }

    pub fn stock_holdings(&self, sref: &SRef) -> impl Iterator<Item = &Holding> {
        self.holdings.iter().filter(move |h| &h.sref == sref)
    }

    pub fn active_holdings(&self, sref: &SRef) -> impl Iterator<Item = &Holding> {
        self.stock_holdings(sref).filter(|h| h.is_active())
    }

    pub fn find_holding(&self, sref: &SRef, purchase_id: &str) -> Option<&Holding> {
        self.holdings
            .iter()
            .find(|h| &h.sref == sref && h.purchase_id == purchase_id)
    }

    pub fn find_trade(&self, sref: &SRef, trade_id: &str) -> Option<&Trade> {
        self.trades
            .iter()
            .find(|t| &t.sref == sref && t.trade_id == trade_id)
    }

    pub fn owned_units(&self, sref: &SRef) -> f64 {
        self.active_holdings(sref).map(|h| h.remaining_units).sum()
    }

    pub fn invested_home(&self, sref: &SRef) -> f64 {
        self.active_holdings(sref)
            .map(|h| h.remaining_invested_home())
            .sum()
    }

    pub fn realized_gain_home(&self, sref: &SRef) -> f64 {
        self.trades
            .iter()
            .filter(|t| &t.sref == sref)
            .map(|t| t.realized_gain_home(&self.holdings))
            .sum()
    }

    pub fn dividends_home(&self, sref: &SRef) -> f64 {
        self.dividends
            .iter()
            .filter(|d| &d.sref == sref)
            .map(|d| d.total_home())
            .sum()
    }

    /// What keeps a followed stock from being unfollowed, if anything.
    pub fn references_to(&self, sref: &SRef) -> Option<&'static str> {
        if self.holdings.iter().any(|h| &h.sref == sref) {
            Some("holdings")
        } else if self.trades.iter().any(|t| &t.sref == sref) {
            Some("trades")
        } else if self.orders.iter().any(|o| &o.sref == sref) {
            Some("orders")
        } else if self.dividends.iter().any(|d| &d.sref == sref) {
            Some("dividends")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn msft() -> SRef {
        SRef::new(MarketId::Nasdaq, "MSFT")
    }

    fn holding(id: &str, units: f64, remaining: f64, price: f64) -> Holding {
        Holding {
            sref: msft(),
            purchase_id: id.into(),
            purchase_date: date(2024, 1, 15),
            units,
            remaining_units: remaining,
            price_per_unit: price,
            fee: 0.0,
            currency_rate: 1.0,
            note: String::new(),
        }
    }

    #[test]
    fn new_portfolio_is_empty() {
        let pf = Portfolio::new("Growth");
        assert_eq!(pf.name, "Growth");
        assert!(pf.srefs.is_empty());
        assert!(pf.holdings.is_empty());
        assert!(pf.references_to(&msft()).is_none());
    }

    #[test]
    fn owned_units_skip_sold_out_holdings() {
        let mut pf = Portfolio::new("Growth");
        pf.srefs.push(msft());
        pf.holdings.push(holding("P1", 10.0, 0.0, 100.0));
        pf.holdings.push(holding("P2", 5.0, 3.0, 200.0));

        assert!((pf.owned_units(&msft()) - 3.0).abs() < f64::EPSILON);
        assert!((pf.invested_home(&msft()) - 600.0).abs() < 1e-9);
        assert_eq!(pf.active_holdings(&msft()).count(), 1);
        assert_eq!(pf.stock_holdings(&msft()).count(), 2);
        assert_eq!(pf.references_to(&msft()), Some("holdings"));
    }

    #[test]
    fn order_matching_and_expiry() {
        let order = Order {
            side: OrderSide::Buy,
            sref: msft(),
            units: 10.0,
            price: 250.0,
            last_date: date(2024, 2, 1),
            fill_date: None,
        };
        assert!(order.matches(OrderSide::Buy, &msft(), 250.0));
        assert!(!order.matches(OrderSide::Sell, &msft(), 250.0));
        assert!(!order.matches(OrderSide::Buy, &msft(), 250.5));
        assert!(!order.is_expired(date(2024, 2, 1)));
        assert!(order.is_expired(date(2024, 2, 2)));

        let filled = Order {
            fill_date: Some(date(2024, 1, 20)),
            ..order
        };
        assert!(!filled.is_expired(date(2024, 3, 1)));
        assert!(filled.is_terminal(date(2024, 1, 21)));
    }

    #[test]
    fn dividend_total() {
        let div = Dividend {
            sref: msft(),
            ex_div_date: date(2024, 2, 14),
            payment_date: date(2024, 3, 14),
            units: 10.0,
            payment_per_unit: 0.75,
            currency_rate: 0.9,
        };
        assert!((div.total_home() - 6.75).abs() < 1e-9);
    }

    #[test]
    fn order_side_parse() {
        assert_eq!("buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!(OrderSide::Sell.to_string(), "Sell");
        assert!("hold".parse::<OrderSide>().is_err());
    }
}
