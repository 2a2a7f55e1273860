//! Configuration validation.
//!
//! Validates all config fields before any command is applied.

use std::str::FromStr;

use crate::domain::error::StalkerError;
use crate::domain::market::{legal_values, CurrencyId, MarketId};
use crate::ports::config_port::ConfigPort;

pub const MIN_LOOKBACK: i64 = 2;
pub const MAX_LOOKBACK: i64 = 250;

pub fn validate_stalker_config(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    validate_command_log(config)?;
    validate_home_currency(config)?;
    validate_lookback(config)?;
    validate_rates(config)?;
    validate_report_markets(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> StalkerError {
    StalkerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_command_log(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    match config.get_string("stalker", "command_log") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(StalkerError::ConfigMissing {
            section: "stalker".to_string(),
            key: "command_log".to_string(),
        }),
    }
}

fn validate_home_currency(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    let Some(value) = config.get_string("stalker", "home_currency") else {
        return Err(StalkerError::ConfigMissing {
            section: "stalker".to_string(),
            key: "home_currency".to_string(),
        });
    };
    CurrencyId::from_str(value.trim()).map_err(|_| {
        invalid(
            "stalker",
            "home_currency",
            format!("unknown currency '{value}' (one of: {})", legal_values::<CurrencyId>()),
        )
    })?;
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    let value = config.get_int("prices", "lookback_period", 10);
    if !(MIN_LOOKBACK..=MAX_LOOKBACK).contains(&value) {
        return Err(invalid(
            "prices",
            "lookback_period",
            format!("lookback_period must be between {MIN_LOOKBACK} and {MAX_LOOKBACK}"),
        ));
    }
    Ok(())
}

fn validate_rates(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    for key in config.keys("rates") {
        if CurrencyId::from_str(&key).is_err() {
            return Err(invalid("rates", &key, "not a currency code"));
        }
        if config.get_double("rates", &key, -1.0) <= 0.0 {
            return Err(invalid("rates", &key, "rate must be a positive number"));
        }
    }
    Ok(())
}

fn validate_report_markets(config: &dyn ConfigPort) -> Result<(), StalkerError> {
    let Some(markets) = config.get_string("report", "markets") else {
        return Ok(());
    };
    for market in markets.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        if MarketId::from_str(market).is_err() {
            return Err(invalid(
                "report",
                "markets",
                format!("unknown market '{market}' (one of: {})", legal_values::<MarketId>()),
            ));
        }
    }
    Ok(())
}
