#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use stalker::domain::market::{CurrencyId, MarketId, MarketStatus};
use stalker::domain::price_bar::{ClosePoint, PriceBar};
use stalker::domain::sref::SRef;
use stalker::domain::stalker::StalkerEngine;
use stalker::ports::market_meta_port::MarketMetaPort;
use stalker::ports::price_port::{LivePricePort, PriceHistoryPort};
use stalker::ports::rate_port::RatePort;
use std::collections::HashMap;

/// Daily closes per stock; the last one doubles as the live bar.
pub struct MockPricePort {
    pub closes: HashMap<SRef, Vec<ClosePoint>>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            closes: HashMap::new(),
        }
    }

    /// Consecutive daily closes ending on `last`.
    pub fn with_closes(mut self, sref: &str, last: NaiveDate, closes: &[f64]) -> Self {
        let start = last - chrono::Duration::days(closes.len() as i64 - 1);
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, close)| ClosePoint {
                date: start + chrono::Duration::days(i as i64),
                close: *close,
            })
            .collect();
        self.closes.insert(sref_of(sref), points);
        self
    }
}

impl PriceHistoryPort for MockPricePort {
    fn last_closes(&self, sref: &SRef, count: usize) -> Option<Vec<ClosePoint>> {
        let closes = self.closes.get(sref)?;
        let start = closes.len().saturating_sub(count);
        Some(closes[start..].to_vec())
    }
}

impl LivePricePort for MockPricePort {
    fn latest(&self, sref: &SRef) -> Option<PriceBar> {
        let closes = self.closes.get(sref)?;
        let last = closes.last()?;
        let prev_close = closes
            .len()
            .checked_sub(2)
            .map(|i| closes[i].close)
            .unwrap_or(0.0);
        Some(PriceBar {
            date: last.date,
            open: last.close,
            high: last.close,
            low: last.close,
            close: last.close,
            prev_close,
        })
    }
}

pub struct MockRatePort {
    pub home: CurrencyId,
    pub rates: HashMap<CurrencyId, f64>,
}

impl MockRatePort {
    pub fn new(home: CurrencyId) -> Self {
        Self {
            home,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, currency: CurrencyId, rate: f64) -> Self {
        self.rates.insert(currency, rate);
        self
    }
}

impl RatePort for MockRatePort {
    fn home_currency(&self) -> CurrencyId {
        self.home
    }

    fn rate_to_home(&self, currency: CurrencyId) -> Option<f64> {
        if currency == self.home {
            return Some(1.0);
        }
        self.rates.get(&currency).copied()
    }
}

pub struct MockMarketMeta {
    pub last_close: Option<NaiveDateTime>,
}

impl MockMarketMeta {
    pub fn closed_at(last_close: NaiveDateTime) -> Self {
        Self {
            last_close: Some(last_close),
        }
    }

    pub fn unknown() -> Self {
        Self { last_close: None }
    }
}

impl MarketMetaPort for MockMarketMeta {
    fn active_markets(&self) -> Vec<MarketId> {
        vec![MarketId::Nasdaq, MarketId::Nyse, MarketId::Omxh]
    }

    fn last_close(&self, _market: MarketId) -> Option<NaiveDateTime> {
        self.last_close
    }

    fn status(&self, _market: MarketId) -> MarketStatus {
        MarketStatus::Closed
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn sref_of(s: &str) -> SRef {
    s.parse().unwrap()
}

pub fn engine_with(lines: &[&str]) -> StalkerEngine {
    let mut engine = StalkerEngine::new().unwrap();
    for line in lines {
        engine
            .apply(line)
            .unwrap_or_else(|e| panic!("{line}: {e}"));
    }
    engine
}

/// Two portfolios across three markets with trades, dividends, orders,
/// alarms and sector tags.
pub const SCENARIO: &[&str] = &[
    "Add-Portfolio PfName=Growth",
    "Add-Portfolio PfName=Income",
    "Follow-Portfolio PfName=Growth SRef=NASDAQ$MSFT",
    "Follow-Portfolio PfName=Growth SRef=OMXH$NOKIA",
    "Follow-Portfolio PfName=Income SRef=NYSE$KO",
    "Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=M1 Date=2024-01-10 Units=10 Price=100 Fee=0 CurrencyRate=0.5",
    "Add-Holding PfName=Growth SRef=NASDAQ$MSFT PurchaseId=M2 Date=2024-02-10 Units=10 Price=140 Fee=0 CurrencyRate=0.5",
    "Add-Holding PfName=Growth SRef=OMXH$NOKIA PurchaseId=N1 Date=2024-01-15 Units=100 Price=4 Fee=2 CurrencyRate=1",
    "Add-Holding PfName=Income SRef=NYSE$KO PurchaseId=K1 Date=2024-01-10 Units=20 Price=60 Fee=0 CurrencyRate=0.5",
    "Add-Trade PfName=Growth SRef=NASDAQ$MSFT TradeId=T1 Date=2024-03-01 Units=5 Price=150 Fee=0 CurrencyRate=0.5 HoldingId=",
    "Add-Divident PfName=Income SRef=NYSE$KO ExDivDate=2024-02-14 PaymentDate=2024-03-14 Units=20 PaymentPerUnit=0.5 CurrencyRate=0.5",
    "Add-Order PfName=Growth Type=Buy SRef=OMXH$NOKIA Units=50 Price=3.5 LastDate=2024-06-30",
    "Add-Alarm Type=Under SRef=NASDAQ$MSFT Level=110 Prms= Note=[buy more]",
    "Set-Sector SectorId=0 SectorName=Industry",
    "Edit-Sector SectorId=0 FieldId=1 FieldName=Tech",
    "Edit-Sector SectorId=0 FieldId=2 FieldName=Staples",
    "Follow-Sector SectorId=0 SRef=NASDAQ$MSFT FieldId=1",
    "Follow-Sector SectorId=0 SRef=OMXH$NOKIA FieldId=1",
    "Follow-Sector SectorId=0 SRef=NYSE$KO FieldId=2",
];
