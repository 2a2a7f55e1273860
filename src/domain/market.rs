//! Closed enumerations: markets, currencies, price providers.

use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum MarketId {
    Nasdaq,
    Nyse,
    Amex,
    Tsx,
    Omxh,
    Omxsto,
    Omxc,
    Xetra,
    Lse,
}

impl MarketId {
    /// Trading currency of the market.
    pub fn currency(self) -> CurrencyId {
        match self {
            MarketId::Nasdaq | MarketId::Nyse | MarketId::Amex => CurrencyId::Usd,
            MarketId::Tsx => CurrencyId::Cad,
            MarketId::Omxh | MarketId::Xetra => CurrencyId::Eur,
            MarketId::Omxsto => CurrencyId::Sek,
            MarketId::Omxc => CurrencyId::Dkk,
            MarketId::Lse => CurrencyId::Gbp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CurrencyId {
    Usd,
    Eur,
    Cad,
    Sek,
    Dkk,
    Nok,
    Gbp,
}

/// External end-of-day price providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ProviderId {
    Fmp,
    MarketStack,
    Polygon,
    AlphaVantage,
    Tiingo,
    Eod,
    Unibit,
    TwelveData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MarketStatus {
    Open,
    Closed,
    Unknown,
}

/// Comma separated list of every legal value of an enumeration.
pub fn legal_values<E: IntoEnumIterator + fmt::Display>() -> String {
    E::iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
