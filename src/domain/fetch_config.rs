//! Market to price provider assignment, built from its own command log.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::debug;

use crate::domain::cmd_parser::{self, TemplateSet};
use crate::domain::error::StalkerError;
use crate::domain::market::{MarketId, ProviderId};

pub const FETCH_TEMPLATES: &[&str] = &["Set-Provider <Provider> <Market>", "Clear-Provider <Market>"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCmd {
    SetProvider {
        provider: ProviderId,
        markets: Vec<MarketId>,
    },
    ClearProvider {
        markets: Vec<MarketId>,
    },
}

/// Values were canonicalized by the parser, so these conversions only fail
/// on a template table mismatch.
fn markets(value: &str) -> Result<Vec<MarketId>, StalkerError> {
    value
        .split(',')
        .map(|m| {
            MarketId::from_str(m).map_err(|_| StalkerError::InvalidValue {
                field: "Market".into(),
                value: m.to_string(),
                reason: "unknown market".into(),
            })
        })
        .collect()
}

fn field<'a>(fields: &'a cmd_parser::FieldMap, key: &str) -> Result<&'a str, StalkerError> {
    fields
        .get(key)
        .ok_or_else(|| StalkerError::invalid(format!("missing {key}")))
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    templates: TemplateSet,
    providers: BTreeMap<MarketId, ProviderId>,
}

impl FetchConfig {
    pub fn new() -> Result<Self, StalkerError> {
        Ok(FetchConfig {
            templates: TemplateSet::new(FETCH_TEMPLATES)?,
            providers: BTreeMap::new(),
        })
    }

    pub fn parse(&self, line: &str) -> Result<FetchCmd, StalkerError> {
        let fields = cmd_parser::parse(line, &self.templates)?;
        match fields.cmd() {
            "Set-Provider" => {
                let provider = field(&fields, "Provider")?;
                Ok(FetchCmd::SetProvider {
                    provider: ProviderId::from_str(provider).map_err(|_| {
                        StalkerError::InvalidValue {
                            field: "Provider".into(),
                            value: provider.to_string(),
                            reason: "unknown provider".into(),
                        }
                    })?,
                    markets: markets(field(&fields, "Market")?)?,
                })
            }
            "Clear-Provider" => Ok(FetchCmd::ClearProvider {
                markets: markets(field(&fields, "Market")?)?,
            }),
            other => Err(StalkerError::invalid(format!(
                "'{other}' is not a fetch command"
            ))),
        }
    }

    pub fn apply(&mut self, line: &str) -> Result<(), StalkerError> {
        match self.parse(line)? {
            FetchCmd::SetProvider { provider, markets } => {
                for market in markets {
                    self.providers.insert(market, provider);
                }
            }
            FetchCmd::ClearProvider { markets } => {
                for market in markets {
                    self.providers.remove(&market);
                }
            }
        }
        debug!(command = line.trim(), "fetch config updated");
        Ok(())
    }

    pub fn provider(&self, market: MarketId) -> Option<ProviderId> {
        self.providers.get(&market).copied()
    }

    /// Assignments ordered by market.
    pub fn assignments(&self) -> Vec<(MarketId, ProviderId)> {
        self.providers.iter().map(|(m, p)| (*m, *p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_providers() {
        let mut config = FetchConfig::new().unwrap();
        config
            .apply("Set-Provider Provider=Fmp Market=NASDAQ,nyse")
            .unwrap();
        config.apply("Set-Provider Provider=eod Market=OMXH").unwrap();
        assert_eq!(config.provider(MarketId::Nyse), Some(ProviderId::Fmp));
        assert_eq!(config.provider(MarketId::Omxh), Some(ProviderId::Eod));

        config.apply("Clear-Provider Market=NYSE").unwrap();
        assert_eq!(
            config.assignments(),
            vec![
                (MarketId::Nasdaq, ProviderId::Fmp),
                (MarketId::Omxh, ProviderId::Eod),
            ]
        );
    }

    #[test]
    fn invalid_market_rejected_without_change() {
        let mut config = FetchConfig::new().unwrap();
        let err = config
            .apply("Set-Provider Provider=Fmp Market=NASDAQ,MOON")
            .unwrap_err();
        assert!(matches!(err, StalkerError::CmdParse(_)));
        assert!(err.to_string().contains("MOON"));
        assert!(config.assignments().is_empty());
    }

    #[test]
    fn prefix_verb() {
        let config = FetchConfig::new().unwrap();
        assert_eq!(
            config.parse("Clear Market=LSE").unwrap(),
            FetchCmd::ClearProvider {
                markets: vec![MarketId::Lse]
            }
        );
    }
}
