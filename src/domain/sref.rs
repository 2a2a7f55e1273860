//! Stock reference: `MARKET$SYMBOL`.

use std::fmt;
use std::str::FromStr;

use super::error::StalkerError;
use super::market::{legal_values, MarketId};

pub const MAX_SYMBOL_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SRef {
    pub market: MarketId,
    pub symbol: String,
}

impl SRef {
    pub fn new(market: MarketId, symbol: &str) -> Self {
        SRef {
            market,
            symbol: symbol.to_uppercase(),
        }
    }
}

impl fmt::Display for SRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.market, self.symbol)
    }
}

impl FromStr for SRef {
    type Err = StalkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| StalkerError::InvalidValue {
            field: "SRef".into(),
            value: s.to_string(),
            reason,
        };

        let (market, symbol) = s
            .split_once('$')
            .ok_or_else(|| invalid("expected MARKET$SYMBOL".into()))?;

        let market = MarketId::from_str(market)
            .map_err(|_| invalid(format!("unknown market, expected one of: {}", legal_values::<MarketId>())))?;

        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return Err(invalid(format!(
                "symbol must be 1..={MAX_SYMBOL_LEN} characters"
            )));
        }
        if symbol.chars().any(|c| c.is_whitespace() || c == '$') {
            return Err(invalid("symbol contains illegal characters".into()));
        }

        Ok(SRef::new(market, symbol))
    }
}
