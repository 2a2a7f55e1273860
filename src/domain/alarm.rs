//! Price alarms, independent of portfolios.

use strum::{Display, EnumString};

use super::portfolio::PRICE_EPSILON;
use super::sref::SRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AlarmType {
    Over,
    Under,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub alarm_type: AlarmType,
    pub sref: SRef,
    pub level: f64,
    pub prms: String,
    pub note: String,
}

impl Alarm {
    pub fn is_at(&self, sref: &SRef, level: f64) -> bool {
        &self.sref == sref && (self.level - level).abs() < PRICE_EPSILON
    }

    /// Whether `close` is on the triggering side of the level.
    pub fn is_triggered(&self, close: f64) -> bool {
        match self.alarm_type {
            AlarmType::Over => close >= self.level,
            AlarmType::Under => close <= self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketId;

    fn alarm(alarm_type: AlarmType) -> Alarm {
        Alarm {
            alarm_type,
            sref: SRef::new(MarketId::Nasdaq, "MSFT"),
            level: 250.0,
            prms: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn trigger_sides() {
        assert!(alarm(AlarmType::Over).is_triggered(250.0));
        assert!(!alarm(AlarmType::Over).is_triggered(249.0));
        assert!(alarm(AlarmType::Under).is_triggered(240.0));
        assert!(!alarm(AlarmType::Under).is_triggered(251.0));
    }

    #[test]
    fn addressed_by_sref_and_level() {
        let a = alarm(AlarmType::Under);
        assert!(a.is_at(&SRef::new(MarketId::Nasdaq, "MSFT"), 250.0));
        assert!(!a.is_at(&SRef::new(MarketId::Nasdaq, "MSFT"), 251.0));
        assert!(!a.is_at(&SRef::new(MarketId::Nyse, "MSFT"), 250.0));
    }
}
