//! Command-sourced portfolio state.
//!
//! [`StalkerEngine::apply`] is the only way state changes. Every handler
//! validates against the current model before touching it, so a rejected
//! command leaves the model exactly as it was.

use tracing::debug;

use crate::domain::alarm::Alarm;
use crate::domain::cmd_parser::TemplateSet;
use crate::domain::error::StalkerError;
use crate::domain::holding::{settle_units, Holding, Trade, TradeAllocation, UNITS_EPSILON};
use crate::domain::portfolio::{Dividend, Order, OrderSide, Portfolio};
use crate::domain::sector::{Sector, StockSectors, MAX_SECTORS};
use crate::domain::sref::SRef;
use crate::domain::stalker_cmd::{stalker_templates, StalkerCmd};

pub type SubscriptionId = u64;

/// Notification passed to subscribers after a successful mutation.
#[derive(Debug, Clone, Copy)]
pub enum StalkerChange<'a> {
    Applied { command: &'a str, cmd: &'a StalkerCmd },
    Restored { commands: usize },
}

type Subscriber = Box<dyn FnMut(&StalkerChange<'_>)>;

/// One successfully applied command as kept in the command log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub line: String,
    pub sref: Option<SRef>,
}

/// The in-memory model. Handed out by value as a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StalkerData {
    pub portfolios: Vec<Portfolio>,
    pub alarms: Vec<Alarm>,
    pub sectors: [Option<Sector>; MAX_SECTORS],
    pub stock_sectors: Vec<StockSectors>,
}

impl StalkerData {
    pub fn portfolio(&self, name: &str) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| p.name == name)
    }

    pub fn sector(&self, sector_id: usize) -> Option<&Sector> {
        self.sectors.get(sector_id).and_then(Option::as_ref)
    }

    pub fn stock_sectors(&self, sref: &SRef) -> Option<&StockSectors> {
        self.stock_sectors.iter().find(|s| &s.sref == sref)
    }

    /// `(sector name, field name)` tags of a stock in sector id order.
    pub fn sector_tags(&self, sref: &SRef) -> Vec<(usize, String, String)> {
        let Some(tags) = self.stock_sectors(sref) else {
            return Vec::new();
        };
        tags.fields
            .iter()
            .enumerate()
            .filter_map(|(sector_id, field_id)| {
                let sector = self.sector(sector_id)?;
                let field = sector.field_name((*field_id)?)?;
                Some((sector_id, sector.name.clone(), field.to_string()))
            })
            .collect()
    }

    /// Every stock followed by any portfolio, first occurrence order.
    pub fn followed_srefs(&self) -> Vec<SRef> {
        let mut srefs: Vec<SRef> = Vec::new();
        for sref in self.portfolios.iter().flat_map(|p| p.srefs.iter()) {
            if !srefs.contains(sref) {
                srefs.push(sref.clone());
            }
        }
        srefs
    }

    fn portfolio_mut(&mut self, name: &str) -> Result<&mut Portfolio, StalkerError> {
        self.portfolios
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| StalkerError::UnknownPortfolio {
                name: name.to_string(),
            })
    }

    fn followed_mut(&mut self, name: &str, sref: &SRef) -> Result<&mut Portfolio, StalkerError> {
        let pf = self.portfolio_mut(name)?;
        if !pf.follows(sref) {
            return Err(StalkerError::NotFollowed {
                portfolio: name.to_string(),
                sref: sref.to_string(),
            });
        }
        Ok(pf)
    }

    fn execute(&mut self, cmd: &StalkerCmd) -> Result<(), StalkerError> {
        match cmd {
            StalkerCmd::AddPortfolio { name } => self.add_portfolio(name),
            StalkerCmd::EditPortfolio { name, new_name } => self.edit_portfolio(name, new_name),
            StalkerCmd::DeletePortfolio { name } => self.delete_portfolio(name),
            StalkerCmd::FollowPortfolio { portfolio, sref } => self.follow(portfolio, sref),
            StalkerCmd::UnfollowPortfolio { portfolio, sref } => self.unfollow(portfolio, sref),
            StalkerCmd::AddHolding { portfolio, holding } => self.add_holding(portfolio, holding),
            StalkerCmd::EditHolding { portfolio, holding } => self.edit_holding(portfolio, holding),
            StalkerCmd::DeleteHolding {
                portfolio,
                sref,
                purchase_id,
            } => self.delete_holding(portfolio, sref, purchase_id),
            StalkerCmd::AddTrade { portfolio, trade } => self.add_trade(portfolio, trade),
            StalkerCmd::DeleteTrade {
                portfolio,
                sref,
                trade_id,
            } => self.delete_trade(portfolio, sref, trade_id),
            StalkerCmd::AddOrder { portfolio, order } => self.add_order(portfolio, order),
            StalkerCmd::FillOrder {
                portfolio,
                side,
                sref,
                price,
                date,
            } => self.fill_order(portfolio, *side, sref, *price, *date),
            StalkerCmd::DeleteOrder {
                portfolio,
                side,
                sref,
                price,
            } => self.delete_order(portfolio, *side, sref, *price),
            StalkerCmd::AddDividend {
                portfolio,
                dividend,
            } => self.add_dividend(portfolio, dividend),
            StalkerCmd::DeleteDividend {
                portfolio,
                sref,
                payment_date,
            } => self.delete_dividend(portfolio, sref, *payment_date),
            StalkerCmd::AddAlarm(alarm) => self.add_alarm(alarm),
            StalkerCmd::DeleteAlarm { sref, level } => self.delete_alarm(sref, *level),
            StalkerCmd::SetSector { sector_id, name } => {
                self.set_sector(*sector_id, name);
                Ok(())
            }
            StalkerCmd::EditSector {
                sector_id,
                field_id,
                name,
            } => {
                self.edit_sector(*sector_id, *field_id, name);
                Ok(())
            }
            StalkerCmd::DeleteSector { sector_id } => self.delete_sector(*sector_id),
            StalkerCmd::FollowSector {
                sector_id,
                sref,
                field_id,
            } => self.follow_sector(*sector_id, sref, *field_id),
            StalkerCmd::UnfollowSector { sector_id, sref } => {
                self.unfollow_sector(*sector_id, sref)
            }
        }
    }

    fn add_portfolio(&mut self, name: &str) -> Result<(), StalkerError> {
        if self.portfolio(name).is_some() {
            return Err(StalkerError::DuplicatePortfolio {
                name: name.to_string(),
            });
        }
        self.portfolios.push(Portfolio::new(name));
        Ok(())
    }

    fn edit_portfolio(&mut self, name: &str, new_name: &str) -> Result<(), StalkerError> {
        self.portfolio_mut(name)?;
        if name != new_name && self.portfolio(new_name).is_some() {
            return Err(StalkerError::DuplicatePortfolio {
                name: new_name.to_string(),
            });
        }
        self.portfolio_mut(name)?.name = new_name.to_string();
        Ok(())
    }

    fn delete_portfolio(&mut self, name: &str) -> Result<(), StalkerError> {
        let index = self
            .portfolios
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| StalkerError::UnknownPortfolio {
                name: name.to_string(),
            })?;
        self.portfolios.remove(index);
        Ok(())
    }

    fn follow(&mut self, portfolio: &str, sref: &SRef) -> Result<(), StalkerError> {
        let pf = self.portfolio_mut(portfolio)?;
        if pf.follows(sref) {
            return Err(StalkerError::Duplicate {
                kind: "followed stock",
                id: format!("{portfolio}/{sref}"),
            });
        }
        pf.srefs.push(sref.clone());
        Ok(())
    }

    fn unfollow(&mut self, portfolio: &str, sref: &SRef) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        if let Some(what) = pf.references_to(sref) {
            return Err(StalkerError::StillReferenced {
                portfolio: portfolio.to_string(),
                sref: sref.to_string(),
                what: what.to_string(),
            });
        }
        pf.srefs.retain(|s| s != sref);
        Ok(())
    }

    fn add_holding(&mut self, portfolio: &str, holding: &Holding) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, &holding.sref)?;
        if pf.find_holding(&holding.sref, &holding.purchase_id).is_some() {
            return Err(StalkerError::Duplicate {
                kind: "purchase id",
                id: holding.purchase_id.clone(),
            });
        }
        pf.holdings.push(holding.clone());
        Ok(())
    }

    fn edit_holding(&mut self, portfolio: &str, edit: &Holding) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, &edit.sref)?;
        let holding = pf
            .holdings
            .iter_mut()
            .find(|h| h.sref == edit.sref && h.purchase_id == edit.purchase_id)
            .ok_or_else(|| StalkerError::NotFound {
                kind: "holding",
                id: edit.purchase_id.clone(),
            })?;
        let sold = holding.sold_units();
        if edit.units + UNITS_EPSILON < sold {
            return Err(StalkerError::invalid(format!(
                "holding {} already has {sold} units sold, cannot reduce to {}",
                edit.purchase_id, edit.units
            )));
        }
        *holding = Holding {
            remaining_units: settle_units(edit.units - sold, edit.units),
            ..edit.clone()
        };
        Ok(())
    }

    fn delete_holding(
        &mut self,
        portfolio: &str,
        sref: &SRef,
        purchase_id: &str,
    ) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        let index = pf
            .holdings
            .iter()
            .position(|h| &h.sref == sref && h.purchase_id == purchase_id)
            .ok_or_else(|| StalkerError::NotFound {
                kind: "holding",
                id: purchase_id.to_string(),
            })?;
        let referenced = pf.trades.iter().any(|t| {
            &t.sref == sref && t.allocations.iter().any(|a| a.purchase_id == purchase_id)
        });
        if referenced {
            return Err(StalkerError::StillReferenced {
                portfolio: portfolio.to_string(),
                sref: format!("{sref} holding {purchase_id}"),
                what: "trades".into(),
            });
        }
        pf.holdings.remove(index);
        Ok(())
    }

    fn add_trade(&mut self, portfolio: &str, trade: &Trade) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, &trade.sref)?;
        if pf.find_trade(&trade.sref, &trade.trade_id).is_some() {
            return Err(StalkerError::Duplicate {
                kind: "trade id",
                id: trade.trade_id.clone(),
            });
        }
        let allocations = allocate(pf, trade)?;

        for allocation in &allocations {
            if let Some(h) = pf
                .holdings
                .iter_mut()
                .find(|h| h.sref == trade.sref && h.purchase_id == allocation.purchase_id)
            {
                h.remaining_units = settle_units(h.remaining_units - allocation.units, h.units);
            }
        }
        pf.trades.push(Trade {
            allocations,
            ..trade.clone()
        });
        Ok(())
    }

    fn delete_trade(
        &mut self,
        portfolio: &str,
        sref: &SRef,
        trade_id: &str,
    ) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        let index = pf
            .trades
            .iter()
            .position(|t| &t.sref == sref && t.trade_id == trade_id)
            .ok_or_else(|| StalkerError::NotFound {
                kind: "trade",
                id: trade_id.to_string(),
            })?;
        let trade = pf.trades.remove(index);
        for allocation in &trade.allocations {
            if let Some(h) = pf
                .holdings
                .iter_mut()
                .find(|h| &h.sref == sref && h.purchase_id == allocation.purchase_id)
            {
                h.remaining_units = settle_units(h.remaining_units + allocation.units, h.units);
            }
        }
        Ok(())
    }

    fn add_order(&mut self, portfolio: &str, order: &Order) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, &order.sref)?;
        if pf
            .orders
            .iter()
            .any(|o| o.fill_date.is_none() && o.matches(order.side, &order.sref, order.price))
        {
            return Err(StalkerError::Duplicate {
                kind: "order",
                id: order_id(order.side, &order.sref, order.price),
            });
        }
        pf.orders.push(order.clone());
        Ok(())
    }

    fn fill_order(
        &mut self,
        portfolio: &str,
        side: OrderSide,
        sref: &SRef,
        price: f64,
        date: chrono::NaiveDate,
    ) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        let order = pf
            .orders
            .iter_mut()
            .find(|o| o.fill_date.is_none() && o.matches(side, sref, price))
            .ok_or_else(|| StalkerError::NotFound {
                kind: "open order",
                id: order_id(side, sref, price),
            })?;
        if order.is_expired(date) {
            return Err(StalkerError::invalid(format!(
                "order {} expired on {}",
                order_id(side, sref, price),
                order.last_date
            )));
        }
        order.fill_date = Some(date);
        Ok(())
    }

    fn delete_order(
        &mut self,
        portfolio: &str,
        side: OrderSide,
        sref: &SRef,
        price: f64,
    ) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        let index = pf
            .orders
            .iter()
            .position(|o| o.fill_date.is_none() && o.matches(side, sref, price))
            .or_else(|| pf.orders.iter().position(|o| o.matches(side, sref, price)))
            .ok_or_else(|| StalkerError::NotFound {
                kind: "order",
                id: order_id(side, sref, price),
            })?;
        pf.orders.remove(index);
        Ok(())
    }

    fn add_dividend(&mut self, portfolio: &str, dividend: &Dividend) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, &dividend.sref)?;
        if pf
            .dividends
            .iter()
            .any(|d| d.sref == dividend.sref && d.payment_date == dividend.payment_date)
        {
            return Err(StalkerError::Duplicate {
                kind: "dividend",
                id: format!("{} {}", dividend.sref, dividend.payment_date),
            });
        }
        if dividend.ex_div_date > dividend.payment_date {
            return Err(StalkerError::invalid(format!(
                "ex-dividend date {} is after payment date {}",
                dividend.ex_div_date, dividend.payment_date
            )));
        }
        pf.dividends.push(dividend.clone());
        Ok(())
    }

    fn delete_dividend(
        &mut self,
        portfolio: &str,
        sref: &SRef,
        payment_date: chrono::NaiveDate,
    ) -> Result<(), StalkerError> {
        let pf = self.followed_mut(portfolio, sref)?;
        let index = pf
            .dividends
            .iter()
            .position(|d| &d.sref == sref && d.payment_date == payment_date)
            .ok_or_else(|| StalkerError::NotFound {
                kind: "dividend",
                id: format!("{sref} {payment_date}"),
            })?;
        pf.dividends.remove(index);
        Ok(())
    }

    fn add_alarm(&mut self, alarm: &Alarm) -> Result<(), StalkerError> {
        if self.alarms.iter().any(|a| a.is_at(&alarm.sref, alarm.level)) {
            return Err(StalkerError::Duplicate {
                kind: "alarm",
                id: format!("{} {:.2}", alarm.sref, alarm.level),
            });
        }
        self.alarms.push(alarm.clone());
        Ok(())
    }

    fn delete_alarm(&mut self, sref: &SRef, level: f64) -> Result<(), StalkerError> {
        let index = self
            .alarms
            .iter()
            .position(|a| a.is_at(sref, level))
            .ok_or_else(|| StalkerError::NotFound {
                kind: "alarm",
                id: format!("{sref} {level:.2}"),
            })?;
        self.alarms.remove(index);
        Ok(())
    }

    fn set_sector(&mut self, sector_id: usize, name: &str) {
        match &mut self.sectors[sector_id] {
            Some(sector) => sector.name = name.to_string(),
            slot => *slot = Some(Sector::new(sector_id, name)),
        }
    }

    fn edit_sector(&mut self, sector_id: usize, field_id: usize, name: &str) {
        self.sectors[sector_id]
            .get_or_insert_with(|| Sector::new(sector_id, ""))
            .set_field(field_id, name);
    }

    fn delete_sector(&mut self, sector_id: usize) -> Result<(), StalkerError> {
        if self.sectors[sector_id].take().is_none() {
            return Err(StalkerError::NotFound {
                kind: "sector",
                id: sector_id.to_string(),
            });
        }
        for tags in &mut self.stock_sectors {
            tags.fields[sector_id] = None;
        }
        self.stock_sectors.retain(|t| !t.is_empty());
        Ok(())
    }

    fn follow_sector(
        &mut self,
        sector_id: usize,
        sref: &SRef,
        field_id: usize,
    ) -> Result<(), StalkerError> {
        let sector = self.sector(sector_id).ok_or_else(|| StalkerError::NotFound {
            kind: "sector",
            id: sector_id.to_string(),
        })?;
        if !sector.has_field(field_id) {
            return Err(StalkerError::NotFound {
                kind: "sector field",
                id: format!("{sector_id}/{field_id}"),
            });
        }
        match self.stock_sectors.iter_mut().find(|t| &t.sref == sref) {
            Some(tags) => tags.fields[sector_id] = Some(field_id),
            None => {
                let mut tags = StockSectors::new(sref.clone());
                tags.fields[sector_id] = Some(field_id);
                self.stock_sectors.push(tags);
            }
        }
        Ok(())
    }

    fn unfollow_sector(&mut self, sector_id: usize, sref: &SRef) -> Result<(), StalkerError> {
        let tags = self
            .stock_sectors
            .iter_mut()
            .find(|t| &t.sref == sref && t.fields[sector_id].is_some())
            .ok_or_else(|| StalkerError::NotFound {
                kind: "sector tag",
                id: format!("{sector_id} {sref}"),
            })?;
        tags.fields[sector_id] = None;
        self.stock_sectors.retain(|t| !t.is_empty());
        Ok(())
    }
}

fn order_id(side: OrderSide, sref: &SRef, price: f64) -> String {
    format!("{side} {sref} @ {price:.2}")
}

/// Units a trade takes from each holding. A linked trade draws from its
/// holding only; an unlinked one draws FIFO by purchase date, ties broken by
/// insertion order.
fn allocate(pf: &Portfolio, trade: &Trade) -> Result<Vec<TradeAllocation>, StalkerError> {
    if let Some(purchase_id) = &trade.holding_id {
        let holding = pf
            .find_holding(&trade.sref, purchase_id)
            .ok_or_else(|| StalkerError::NotFound {
                kind: "holding",
                id: purchase_id.clone(),
            })?;
        if trade.units > holding.remaining_units + UNITS_EPSILON {
            return Err(StalkerError::OverSell {
                purchase_id: purchase_id.clone(),
                requested: trade.units,
                remaining: holding.remaining_units,
            });
        }
        return Ok(vec![TradeAllocation {
            purchase_id: purchase_id.clone(),
            units: trade.units,
        }]);
    }

    let mut active: Vec<&Holding> = pf.active_holdings(&trade.sref).collect();
    active.sort_by_key(|h| h.purchase_date);
    let available: f64 = active.iter().map(|h| h.remaining_units).sum();
    if trade.units > available + UNITS_EPSILON {
        return Err(StalkerError::OverSell {
            purchase_id: format!("{} (unlinked)", trade.sref),
            requested: trade.units,
            remaining: available,
        });
    }

    let mut left = trade.units;
    let mut allocations = Vec::new();
    for holding in active {
        if left <= UNITS_EPSILON {
            break;
        }
        let units = left.min(holding.remaining_units);
        allocations.push(TradeAllocation {
            purchase_id: holding.purchase_id.clone(),
            units,
        });
        left -= units;
    }
    Ok(allocations)
}

/// Owner of the canonical model and the log that produced it.
pub struct StalkerEngine {
    templates: TemplateSet,
    data: StalkerData,
    log: Vec<LogEntry>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl StalkerEngine {
    pub fn new() -> Result<Self, StalkerError> {
        Ok(StalkerEngine {
            templates: stalker_templates()?,
            data: StalkerData::default(),
            log: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
        })
    }

    /// Resets to the empty model. Subscriptions are kept.
    pub fn init(&mut self) {
        self.data = StalkerData::default();
        self.log.clear();
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Parses, validates and applies one command line.
    pub fn apply(&mut self, line: &str) -> Result<(), StalkerError> {
        let line = line.trim();
        let cmd = StalkerCmd::parse(line, &self.templates)?;
        self.data.execute(&cmd)?;
        debug!(verb = cmd.verb(), command = line, "applied");

        self.log.push(LogEntry {
            line: line.to_string(),
            sref: cmd.sref().cloned(),
        });
        let change = StalkerChange::Applied { command: line, cmd: &cmd };
        self.notify(&change);
        Ok(())
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&StalkerChange<'_>) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, change: &StalkerChange<'_>) {
        for (_, callback) in &mut self.subscribers {
            callback(change);
        }
    }

    pub(crate) fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }

    /// Swaps in a replayed model and log.
    pub(crate) fn replace_state(&mut self, other: StalkerEngine) {
        self.data = other.data;
        self.log = other.log;
        let change = StalkerChange::Restored {
            commands: self.log.len(),
        };
        self.notify(&change);
    }

    pub fn snapshot(&self) -> StalkerData {
        self.data.clone()
    }

    pub fn portfolios(&self) -> Vec<Portfolio> {
        self.data.portfolios.clone()
    }

    pub fn portfolio(&self, name: &str) -> Option<Portfolio> {
        self.data.portfolio(name).cloned()
    }

    pub fn portfolio_holdings(&self, portfolio: &str, sref: &SRef) -> Vec<Holding> {
        self.data
            .portfolio(portfolio)
            .map(|p| p.stock_holdings(sref).cloned().collect())
            .unwrap_or_default()
    }

    pub fn portfolio_trades(&self, portfolio: &str, sref: &SRef) -> Vec<Trade> {
        self.data
            .portfolio(portfolio)
            .map(|p| p.trades.iter().filter(|t| &t.sref == sref).cloned().collect())
            .unwrap_or_default()
    }

    pub fn portfolio_orders(&self, portfolio: &str) -> Vec<Order> {
        self.data
            .portfolio(portfolio)
            .map(|p| p.orders.clone())
            .unwrap_or_default()
    }

    pub fn portfolio_dividends(&self, portfolio: &str, sref: &SRef) -> Vec<Dividend> {
        self.data
            .portfolio(portfolio)
            .map(|p| p.dividends.iter().filter(|d| &d.sref == sref).cloned().collect())
            .unwrap_or_default()
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.data.alarms.clone()
    }

    pub fn sectors(&self) -> Vec<Sector> {
        self.data.sectors.iter().flatten().cloned().collect()
    }

    pub fn stock_sectors(&self, sref: &SRef) -> Option<StockSectors> {
        self.data.stock_sectors(sref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketId;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn msft() -> SRef {
        SRef::new(MarketId::Nasdaq, "MSFT")
    }

    fn engine(lines: &[&str]) -> StalkerEngine {
        let mut engine = StalkerEngine::new().unwrap();
        for line in lines {
            engine.apply(line).unwrap();
        }
        engine
    }

    const BASE: &[&str] = &[
        "Add-Portfolio PfName=Growth",
        "Follow-Portfolio PfName=Growth SRef=NASDAQ$MSFT",
        "Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1 Date=2024-01-10 Units=10 Price=100 Fee=0 CurrencyRate=1",
        "Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P2 Date=2024-02-10 Units=5 Price=120 Fee=0 CurrencyRate=1",
    ];

    fn remaining(engine: &StalkerEngine, id: &str) -> f64 {
        engine
            .portfolio_holdings("Growth", &msft())
            .iter()
            .find(|h| h.purchase_id == id)
            .map(|h| h.remaining_units)
            .unwrap()
    }

    #[test]
    fn builds_portfolio_from_commands() {
        let e = engine(BASE);
        let pfs = e.portfolios();
        assert_eq!(pfs.len(), 1);
        assert_eq!(pfs[0].srefs, vec![msft()]);
        assert_eq!(e.portfolio_holdings("Growth", &msft()).len(), 2);
    }

    #[test]
    fn unknown_portfolio_rejected() {
        let mut e = engine(&[]);
        let err = e.apply("Follow-Portfolio PfName=Nope SRef=NASDAQ$MSFT").unwrap_err();
        assert!(matches!(err, StalkerError::UnknownPortfolio { .. }));
    }

    #[test]
    fn holding_requires_followed_stock() {
        let mut e = engine(&["Add-Portfolio PfName=Growth"]);
        let err = e
            .apply("Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1 Date=2024-01-10 Units=1 Price=1 Fee=0 CurrencyRate=1")
            .unwrap_err();
        assert!(matches!(err, StalkerError::NotFollowed { .. }));
    }

    #[test]
    fn duplicate_purchase_id_rejected_without_change() {
        let mut e = engine(BASE);
        let before = e.snapshot();
        let err = e
            .apply("Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1 Date=2024-03-10 Units=1 Price=1 Fee=0 CurrencyRate=1")
            .unwrap_err();
        assert!(matches!(err, StalkerError::Duplicate { kind: "purchase id", .. }));
        assert_eq!(e.snapshot(), before);
    }

    #[test]
    fn edit_portfolio_checks_existence_first() {
        let mut e = engine(&["Add-Portfolio PfName=Growth", "Add-Portfolio PfName=Income"]);
        let err = e
            .apply("Edit-Portfolio PfName=Nope NewName=Growth")
            .unwrap_err();
        assert!(matches!(err, StalkerError::UnknownPortfolio { name } if name == "Nope"));

        let err = e
            .apply("Edit-Portfolio PfName=Growth NewName=Income")
            .unwrap_err();
        assert!(matches!(err, StalkerError::DuplicatePortfolio { .. }));

        e.apply("Edit-Portfolio PfName=Growth NewName=Growth").unwrap();
        e.apply("Edit-Portfolio PfName=Growth NewName=Value").unwrap();
        assert!(e.portfolio("Value").is_some());
    }

    #[test]
    fn fractional_sales_settle_to_zero() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=9.7 Price=150 Fee=0 CurrencyRate=1 HoldingId=P1")
            .unwrap();
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T2 Date=2024-03-02 Units=0.3 Price=150 Fee=0 CurrencyRate=1 HoldingId=P1")
            .unwrap();
        assert_eq!(remaining(&e, "P1"), 0.0);
        let data = e.snapshot();
        let pf = data.portfolio("Growth").unwrap();
        assert_eq!(pf.active_holdings(&msft()).count(), 1);

        e.apply("Delete-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1").unwrap();
        assert!((remaining(&e, "P1") - 9.7).abs() < 1e-9);
    }

    #[test]
    fn linked_trade_reduces_remaining_units() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=4 Price=150 Fee=0 CurrencyRate=1 HoldingId=P2")
            .unwrap();
        assert!((remaining(&e, "P2") - 1.0).abs() < f64::EPSILON);
        assert!((remaining(&e, "P1") - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn over_selling_fails_and_leaves_units() {
        let mut e = engine(BASE);
        let before = e.snapshot();
        let err = e
            .apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=6 Price=150 Fee=0 CurrencyRate=1 HoldingId=P2")
            .unwrap_err();
        assert!(matches!(err, StalkerError::OverSell { .. }));
        assert_eq!(e.snapshot(), before);
        assert!((remaining(&e, "P2") - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sold_units_never_exceed_original() {
        let mut e = engine(BASE);
        for i in 0..10 {
            let _ = e.apply(&format!(
                "Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T{i} Date=2024-03-01 Units=2 Price=150 Fee=0 CurrencyRate=1 HoldingId=P2"
            ));
        }
        let sold: f64 = e
            .portfolio_trades("Growth", &msft())
            .iter()
            .filter(|t| t.holding_id.as_deref() == Some("P2"))
            .map(|t| t.units)
            .sum();
        assert!(sold <= 5.0);
        assert!(remaining(&e, "P2") >= 0.0);
    }

    #[test]
    fn unlinked_trade_consumes_fifo() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=12 Price=150 Fee=0 CurrencyRate=1 HoldingId=")
            .unwrap();
        assert!(remaining(&e, "P1").abs() < f64::EPSILON);
        assert!((remaining(&e, "P2") - 3.0).abs() < f64::EPSILON);

        let trade = &e.portfolio_trades("Growth", &msft())[0];
        assert_eq!(trade.allocations.len(), 2);
        assert_eq!(trade.allocations[0].purchase_id, "P1");
        assert!((trade.allocations[1].units - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn delete_trade_restores_units() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=12 Price=150 Fee=0 CurrencyRate=1 HoldingId=")
            .unwrap();
        e.apply("Delete-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1").unwrap();
        assert!((remaining(&e, "P1") - 10.0).abs() < f64::EPSILON);
        assert!((remaining(&e, "P2") - 5.0).abs() < f64::EPSILON);
        assert!(e.portfolio_trades("Growth", &msft()).is_empty());
    }

    #[test]
    fn referenced_holding_cannot_be_deleted() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=1 Price=150 Fee=0 CurrencyRate=1 HoldingId=P1")
            .unwrap();
        let err = e
            .apply("Delete-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1")
            .unwrap_err();
        assert!(matches!(err, StalkerError::StillReferenced { .. }));
        e.apply("Delete-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P2").unwrap();
        assert_eq!(e.portfolio_holdings("Growth", &msft()).len(), 1);
    }

    #[test]
    fn edit_holding_keeps_sold_units() {
        let mut e = engine(BASE);
        e.apply("Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=4 Price=150 Fee=0 CurrencyRate=1 HoldingId=P1")
            .unwrap();
        e.apply("Edit-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1 Date=2024-01-10 Units=8 Price=99 Fee=1 CurrencyRate=1 Note=[fixed price]")
            .unwrap();
        assert!((remaining(&e, "P1") - 4.0).abs() < f64::EPSILON);

        let err = e
            .apply("Edit-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=P1 Date=2024-01-10 Units=3 Price=99 Fee=1 CurrencyRate=1")
            .unwrap_err();
        assert!(matches!(err, StalkerError::Invalid { .. }));
    }

    #[test]
    fn unfollow_blocked_while_referenced() {
        let mut e = engine(BASE);
        let err = e
            .apply("Unfollow-Portfolio PfName=Growth SRef=NASDAQ$MSFT")
            .unwrap_err();
        assert!(matches!(err, StalkerError::StillReferenced { ref what, .. } if what == "holdings"));

        e.apply("Follow-Portfolio PfName=Growth SRef=NYSE$KO").unwrap();
        e.apply("Unfollow-Portfolio PfName=Growth SRef=NYSE$KO").unwrap();
        assert_eq!(e.portfolio("Growth").unwrap().srefs, vec![msft()]);
    }

    #[test]
    fn rename_and_delete_portfolio() {
        let mut e = engine(BASE);
        e.apply("Add-Portfolio PfName=Income").unwrap();
        let err = e.apply("Edit-Portfolio PfName=Growth NewName=Income").unwrap_err();
        assert!(matches!(err, StalkerError::DuplicatePortfolio { .. }));

        e.apply("Edit-Portfolio PfName=Growth NewName=Tech").unwrap();
        assert_eq!(e.portfolio_holdings("Tech", &msft()).len(), 2);
        e.apply("Delete-Portfolio PfName=Tech").unwrap();
        assert_eq!(e.portfolios().len(), 1);
    }

    #[test]
    fn order_lifecycle() {
        let mut e = engine(BASE);
        e.apply("Add-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Units=5 Price=90 LastDate=2024-06-30")
            .unwrap();
        let err = e
            .apply("Add-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Units=1 Price=90.0000001 LastDate=2024-06-30")
            .unwrap_err();
        assert!(matches!(err, StalkerError::Duplicate { kind: "order", .. }));

        let err = e
            .apply("Fill-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Price=90 Date=2024-07-01")
            .unwrap_err();
        assert!(matches!(err, StalkerError::Invalid { .. }));

        e.apply("Fill-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Price=90 Date=2024-06-01")
            .unwrap();
        let orders = e.portfolio_orders("Growth");
        assert_eq!(orders[0].fill_date, chrono::NaiveDate::from_ymd_opt(2024, 6, 1));

        let err = e
            .apply("Fill-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Price=90 Date=2024-06-02")
            .unwrap_err();
        assert!(matches!(err, StalkerError::NotFound { .. }));

        e.apply("Delete-Order PfName=Growth Type=Buy SRef=NASDAQ$MSFT Price=90").unwrap();
        assert!(e.portfolio_orders("Growth").is_empty());
    }

    #[test]
    fn dividends_keyed_by_payment_date() {
        let mut e = engine(BASE);
        let add = "Add-Divident PfName=Growth SRef=NASDAQ$MSFT ExDivDate=2024-02-14 PaymentDate=2024-03-14 Units=15 PaymentPerUnit=0.75 CurrencyRate=1";
        e.apply(add).unwrap();
        assert!(matches!(e.apply(add).unwrap_err(), StalkerError::Duplicate { .. }));
        assert_eq!(e.portfolio_dividends("Growth", &msft()).len(), 1);
        e.apply("Delete-Divident PfName=Growth SRef=NASDAQ$MSFT PaymentDate=2024-03-14")
            .unwrap();
        assert!(e.portfolio_dividends("Growth", &msft()).is_empty());
    }

    #[test]
    fn alarms_keyed_by_sref_and_level() {
        let mut e = engine(&[]);
        e.apply("Add-Alarm Type=Under SRef=NASDAQ$MSFT Level=250.00 Prms= Note=BuyMore").unwrap();
        assert!(e.apply("Add-Alarm Type=Over SRef=NASDAQ$MSFT Level=250 Prms=").is_err());
        e.apply("Add-Alarm Type=Over SRef=NASDAQ$MSFT Level=300 Prms=").unwrap();
        e.apply("Delete-Alarm SRef=NASDAQ$MSFT Level=250").unwrap();
        let alarms = e.alarms();
        assert_eq!(alarms.len(), 1);
        assert!((alarms[0].level - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sector_tags() {
        let mut e = engine(&[]);
        e.apply("Edit-Sector SectorId=1 FieldId=4 FieldName=Tech").unwrap();
        assert_eq!(e.sectors()[0].name, "");
        e.apply("Set-Sector SectorId=1 SectorName=Industry").unwrap();
        assert_eq!(e.sectors()[0].field_name(4), Some("Tech"));

        let err = e.apply("Follow-Sector SectorId=1 SRef=NASDAQ$MSFT FieldId=5").unwrap_err();
        assert!(matches!(err, StalkerError::NotFound { kind: "sector field", .. }));

        e.apply("Follow-Sector SectorId=1 SRef=NASDAQ$MSFT FieldId=4").unwrap();
        let tags = e.snapshot().sector_tags(&msft());
        assert_eq!(tags, vec![(1, "Industry".to_string(), "Tech".to_string())]);

        e.apply("Delete-Sector SectorId=1").unwrap();
        assert!(e.stock_sectors(&msft()).is_none());
        assert!(e.apply("Unfollow-Sector SectorId=1 SRef=NASDAQ$MSFT").is_err());
    }

    #[test]
    fn subscribers_see_successful_commands_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut e = engine(&[]);
        let sink = Rc::clone(&seen);
        let id = e.subscribe(move |change| {
            if let StalkerChange::Applied { cmd, .. } = change {
                sink.borrow_mut().push(cmd.verb());
            }
        });

        e.apply("Add-Portfolio PfName=Growth").unwrap();
        let _ = e.apply("Add-Portfolio PfName=Growth");
        assert_eq!(*seen.borrow(), vec!["Add-Portfolio"]);

        assert!(e.unsubscribe(id));
        assert!(!e.unsubscribe(id));
        e.apply("Add-Portfolio PfName=Income").unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn replay_is_deterministic() {
        let a = engine(BASE);
        let b = engine(BASE);
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn init_resets_model() {
        let mut e = engine(BASE);
        e.init();
        assert!(e.portfolios().is_empty());
        assert!(e.log_entries().is_empty());
    }
}
