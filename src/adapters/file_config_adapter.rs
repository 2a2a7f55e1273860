//! INI file configuration adapter, plus the config-backed rate table.

use std::str::FromStr;

use configparser::ini::Ini;
use std::path::Path;

use crate::domain::error::StalkerError;
use crate::domain::market::CurrencyId;
use crate::ports::config_port::ConfigPort;
use crate::ports::rate_port::RatePort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Fixed rates from the `[rates]` section. The home currency always
/// converts at 1.
#[derive(Debug, Clone)]
pub struct ConfigRateAdapter {
    home: CurrencyId,
    rates: Vec<(CurrencyId, f64)>,
}

impl ConfigRateAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StalkerError> {
        let home_str = config
            .get_string("stalker", "home_currency")
            .ok_or_else(|| StalkerError::ConfigMissing {
                section: "stalker".into(),
                key: "home_currency".into(),
            })?;
        let home = CurrencyId::from_str(home_str.trim()).map_err(|_| StalkerError::ConfigInvalid {
            section: "stalker".into(),
            key: "home_currency".into(),
            reason: format!("unknown currency '{home_str}'"),
        })?;

        let mut rates = Vec::new();
        for key in config.keys("rates") {
            let currency = CurrencyId::from_str(&key).map_err(|_| StalkerError::ConfigInvalid {
                section: "rates".into(),
                key: key.clone(),
                reason: "not a currency code".into(),
            })?;
            let rate = config.get_double("rates", &key, 0.0);
            if rate <= 0.0 {
                return Err(StalkerError::ConfigInvalid {
                    section: "rates".into(),
                    key,
                    reason: "rate must be a positive number".into(),
                });
            }
            rates.push((currency, rate));
        }
        Ok(Self { home, rates })
    }
}

impl RatePort for ConfigRateAdapter {
    fn home_currency(&self) -> CurrencyId {
        self.home
    }

    fn rate_to_home(&self, currency: CurrencyId) -> Option<f64> {
        if currency == self.home {
            return Some(1.0);
        }
        self.rates
            .iter()
            .find(|(c, _)| *c == currency)
            .map(|(_, rate)| *rate)
    }
}
