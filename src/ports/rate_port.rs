//! Currency rate port.

use crate::domain::market::CurrencyId;

pub trait RatePort {
    fn home_currency(&self) -> CurrencyId;

    /// Multiplier converting one unit of `currency` to home currency.
    fn rate_to_home(&self, currency: CurrencyId) -> Option<f64>;
}
