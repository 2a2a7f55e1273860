//! Stalker command table and typed commands.
//!
//! The template strings below are a persisted wire format: command logs written
//! by earlier versions are replayed against them, so verbs, field names and
//! field order must not change without a log migration.

use chrono::NaiveDate;
use std::str::FromStr;

use crate::domain::alarm::{Alarm, AlarmType};
use crate::domain::cmd_parser::{self, FieldMap, TemplateSet};
use crate::domain::error::StalkerError;
use crate::domain::holding::{Holding, Trade};
use crate::domain::portfolio::{Dividend, Order, OrderSide};
use crate::domain::sector::{MAX_FIELDS, MAX_SECTORS};
use crate::domain::sref::SRef;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const STALKER_TEMPLATES: &[&str] = &[
    "Add-Portfolio PfName",
    "Edit-Portfolio PfName NewName",
    "Delete-Portfolio PfName",
    "Follow-Portfolio PfName SRef",
    "Unfollow-Portfolio PfName SRef",
    "Add-Holding PfName SRef PurchaseId Date Units Price Fee CurrencyRate [Note]",
    "Edit-Holding PfName SRef PurchaseId Date Units Price Fee CurrencyRate [Note]",
    "Delete-Holding PfName SRef PurchaseId",
    "Add-Trade PfName SRef TradeId Date Units Price Fee CurrencyRate HoldingId [Note]",
    "Delete-Trade PfName SRef TradeId",
    "Add-Order PfName Type SRef Units Price LastDate",
    "Fill-Order PfName Type SRef Price Date",
    "Delete-Order PfName Type SRef Price",
    "Add-Divident PfName SRef ExDivDate PaymentDate Units PaymentPerUnit CurrencyRate",
    "Delete-Divident PfName SRef PaymentDate",
    "Add-Alarm Type SRef Level Prms [Note]",
    "Delete-Alarm SRef Level",
    "Set-Sector SectorId SectorName",
    "Edit-Sector SectorId FieldId FieldName",
    "Delete-Sector SectorId",
    "Follow-Sector SectorId SRef FieldId",
    "Unfollow-Sector SectorId SRef",
];

/// The stalker template table. The table is a constant, so failure here is a
/// programming error surfaced as a parse error rather than a panic.
pub fn stalker_templates() -> Result<TemplateSet, StalkerError> {
    Ok(TemplateSet::new(STALKER_TEMPLATES)?)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StalkerCmd {
    AddPortfolio {
        name: String,
    },
    EditPortfolio {
        name: String,
        new_name: String,
    },
    DeletePortfolio {
        name: String,
    },
    FollowPortfolio {
        portfolio: String,
        sref: SRef,
    },
    UnfollowPortfolio {
        portfolio: String,
        sref: SRef,
    },
    AddHolding {
        portfolio: String,
        holding: Holding,
    },
    EditHolding {
        portfolio: String,
        holding: Holding,
    },
    DeleteHolding {
        portfolio: String,
        sref: SRef,
        purchase_id: String,
    },
    AddTrade {
        portfolio: String,
        trade: Trade,
    },
    DeleteTrade {
        portfolio: String,
        sref: SRef,
        trade_id: String,
    },
    AddOrder {
        portfolio: String,
        order: Order,
    },
    FillOrder {
        portfolio: String,
        side: OrderSide,
        sref: SRef,
        price: f64,
        date: NaiveDate,
    },
    DeleteOrder {
        portfolio: String,
        side: OrderSide,
        sref: SRef,
        price: f64,
    },
    AddDividend {
        portfolio: String,
        dividend: Dividend,
    },
    DeleteDividend {
        portfolio: String,
        sref: SRef,
        payment_date: NaiveDate,
    },
    AddAlarm(Alarm),
    DeleteAlarm {
        sref: SRef,
        level: f64,
    },
    SetSector {
        sector_id: usize,
        name: String,
    },
    EditSector {
        sector_id: usize,
        field_id: usize,
        name: String,
    },
    DeleteSector {
        sector_id: usize,
    },
    FollowSector {
        sector_id: usize,
        sref: SRef,
        field_id: usize,
    },
    UnfollowSector {
        sector_id: usize,
        sref: SRef,
    },
}

fn raw<'a>(f: &'a FieldMap, key: &str) -> Result<&'a str, StalkerError> {
    f.get(key).ok_or_else(|| StalkerError::InvalidValue {
        field: key.to_string(),
        value: String::new(),
        reason: "missing".into(),
    })
}

fn invalid(key: &str, value: &str, reason: &str) -> StalkerError {
    StalkerError::InvalidValue {
        field: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn name(f: &FieldMap, key: &str) -> Result<String, StalkerError> {
    let value = raw(f, key)?;
    if value.trim().is_empty() {
        return Err(invalid(key, value, "must not be empty"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid(key, value, "must not contain control characters"));
    }
    Ok(value.to_string())
}

fn text(f: &FieldMap, key: &str) -> Result<String, StalkerError> {
    Ok(raw(f, key)?.to_string())
}

fn sref(f: &FieldMap) -> Result<SRef, StalkerError> {
    SRef::from_str(raw(f, "SRef")?)
}

fn date(f: &FieldMap, key: &str) -> Result<NaiveDate, StalkerError> {
    let value = raw(f, key)?;
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| invalid(key, value, "expected YYYY-MM-DD"))
}

fn number(f: &FieldMap, key: &str) -> Result<f64, StalkerError> {
    let value = raw(f, key)?;
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(invalid(key, value, "expected a decimal number")),
    }
}

fn positive(f: &FieldMap, key: &str) -> Result<f64, StalkerError> {
    let n = number(f, key)?;
    if n <= 0.0 {
        return Err(invalid(key, raw(f, key)?, "must be positive"));
    }
    Ok(n)
}

fn non_negative(f: &FieldMap, key: &str) -> Result<f64, StalkerError> {
    let n = number(f, key)?;
    if n < 0.0 {
        return Err(invalid(key, raw(f, key)?, "must not be negative"));
    }
    Ok(n)
}

fn index(f: &FieldMap, key: &str, max: usize) -> Result<usize, StalkerError> {
    let value = raw(f, key)?;
    match value.parse::<usize>() {
        Ok(n) if n < max => Ok(n),
        _ => Err(invalid(key, value, &format!("expected an id in 0..{max}"))),
    }
}

fn parse_enum<T: FromStr>(f: &FieldMap, key: &str, legal: &str) -> Result<T, StalkerError> {
    let value = raw(f, key)?;
    T::from_str(value).map_err(|_| invalid(key, value, &format!("expected one of: {legal}")))
}

fn holding(f: &FieldMap) -> Result<Holding, StalkerError> {
    let units = positive(f, "Units")?;
    Ok(Holding {
        sref: sref(f)?,
        purchase_id: name(f, "PurchaseId")?,
        purchase_date: date(f, "Date")?,
        units,
        remaining_units: units,
        price_per_unit: non_negative(f, "Price")?,
        fee: non_negative(f, "Fee")?,
        currency_rate: positive(f, "CurrencyRate")?,
        note: text(f, "Note")?,
    })
}

impl StalkerCmd {
    /// Parses and type-checks one command line.
    pub fn parse(line: &str, templates: &TemplateSet) -> Result<Self, StalkerError> {
        let fields = cmd_parser::parse(line, templates)?;
        Self::from_fields(&fields)
    }

    pub fn from_fields(f: &FieldMap) -> Result<Self, StalkerError> {
        let cmd = match f.cmd() {
            "Add-Portfolio" => StalkerCmd::AddPortfolio {
                name: name(f, "PfName")?,
            },
            "Edit-Portfolio" => StalkerCmd::EditPortfolio {
                name: name(f, "PfName")?,
                new_name: name(f, "NewName")?,
            },
            "Delete-Portfolio" => StalkerCmd::DeletePortfolio {
                name: name(f, "PfName")?,
            },
            "Follow-Portfolio" => StalkerCmd::FollowPortfolio {
                portfolio: name(f, "PfName")?,
                sref: sref(f)?,
            },
            "Unfollow-Portfolio" => StalkerCmd::UnfollowPortfolio {
                portfolio: name(f, "PfName")?,
                sref: sref(f)?,
            },
            "Add-Holding" => StalkerCmd::AddHolding {
                portfolio: name(f, "PfName")?,
                holding: holding(f)?,
            },
            "Edit-Holding" => StalkerCmd::EditHolding {
                portfolio: name(f, "PfName")?,
                holding: holding(f)?,
            },
            "Delete-Holding" => StalkerCmd::DeleteHolding {
                portfolio: name(f, "PfName")?,
                sref: sref(f)?,
                purchase_id: name(f, "PurchaseId")?,
            },
            "Add-Trade" => {
                let holding_id = text(f, "HoldingId")?;
                StalkerCmd::AddTrade {
                    portfolio: name(f, "PfName")?,
                    trade: Trade {
                        sref: sref(f)?,
                        trade_id: name(f, "TradeId")?,
                        trade_date: date(f, "Date")?,
                        units: positive(f, "Units")?,
                        price_per_unit: non_negative(f, "Price")?,
                        fee: non_negative(f, "Fee")?,
                        currency_rate: positive(f, "CurrencyRate")?,
                        holding_id: (!holding_id.is_empty()).then_some(holding_id),
                        note: text(f, "Note")?,
                        allocations: Vec::new(),
                    },
                }
            }
            "Delete-Trade" => StalkerCmd::DeleteTrade {
                portfolio: name(f, "PfName")?,
                sref: sref(f)?,
                trade_id: name(f, "TradeId")?,
            },
            "Add-Order" => StalkerCmd::AddOrder {
                portfolio: name(f, "PfName")?,
                order: Order {
                    side: parse_enum(f, "Type", "Buy, Sell")?,
                    sref: sref(f)?,
                    units: positive(f, "Units")?,
                    price: positive(f, "Price")?,
                    last_date: date(f, "LastDate")?,
                    fill_date: None,
                },
            },
            "Fill-Order" => StalkerCmd::FillOrder {
                portfolio: name(f, "PfName")?,
                side: parse_enum(f, "Type", "Buy, Sell")?,
                sref: sref(f)?,
                price: positive(f, "Price")?,
                date: date(f, "Date")?,
            },
            "Delete-Order" => StalkerCmd::DeleteOrder {
                portfolio: name(f, "PfName")?,
                side: parse_enum(f, "Type", "Buy, Sell")?,
                sref: sref(f)?,
                price: positive(f, "Price")?,
            },
            "Add-Divident" => StalkerCmd::AddDividend {
                portfolio: name(f, "PfName")?,
                dividend: Dividend {
                    sref: sref(f)?,
                    ex_div_date: date(f, "ExDivDate")?,
                    payment_date: date(f, "PaymentDate")?,
                    units: positive(f, "Units")?,
                    payment_per_unit: positive(f, "PaymentPerUnit")?,
                    currency_rate: positive(f, "CurrencyRate")?,
                },
            },
            "Delete-Divident" => StalkerCmd::DeleteDividend {
                portfolio: name(f, "PfName")?,
                sref: sref(f)?,
                payment_date: date(f, "PaymentDate")?,
            },
            "Add-Alarm" => StalkerCmd::AddAlarm(Alarm {
                alarm_type: parse_enum::<AlarmType>(f, "Type", "Over, Under")?,
                sref: sref(f)?,
                level: positive(f, "Level")?,
                prms: text(f, "Prms")?,
                note: text(f, "Note")?,
            }),
            "Delete-Alarm" => StalkerCmd::DeleteAlarm {
                sref: sref(f)?,
                level: positive(f, "Level")?,
            },
            "Set-Sector" => StalkerCmd::SetSector {
                sector_id: index(f, "SectorId", MAX_SECTORS)?,
                name: name(f, "SectorName")?,
            },
            "Edit-Sector" => StalkerCmd::EditSector {
                sector_id: index(f, "SectorId", MAX_SECTORS)?,
                field_id: index(f, "FieldId", MAX_FIELDS)?,
                name: name(f, "FieldName")?,
            },
            "Delete-Sector" => StalkerCmd::DeleteSector {
                sector_id: index(f, "SectorId", MAX_SECTORS)?,
            },
            "Follow-Sector" => StalkerCmd::FollowSector {
                sector_id: index(f, "SectorId", MAX_SECTORS)?,
                sref: sref(f)?,
                field_id: index(f, "FieldId", MAX_FIELDS)?,
            },
            "Unfollow-Sector" => StalkerCmd::UnfollowSector {
                sector_id: index(f, "SectorId", MAX_SECTORS)?,
                sref: sref(f)?,
            },
            other => {
                return Err(StalkerError::invalid(format!(
                    "'{other}' is not a stalker command"
                )));
            }
        };
        Ok(cmd)
    }

    /// The stock the command is about, if any.
    pub fn sref(&self) -> Option<&SRef> {
        match self {
            StalkerCmd::AddPortfolio { .. }
            | StalkerCmd::EditPortfolio { .. }
            | StalkerCmd::DeletePortfolio { .. }
            | StalkerCmd::SetSector { .. }
            | StalkerCmd::EditSector { .. }
            | StalkerCmd::DeleteSector { .. } => None,
            StalkerCmd::FollowPortfolio { sref, .. }
            | StalkerCmd::UnfollowPortfolio { sref, .. }
            | StalkerCmd::DeleteHolding { sref, .. }
            | StalkerCmd::DeleteTrade { sref, .. }
            | StalkerCmd::FillOrder { sref, .. }
            | StalkerCmd::DeleteOrder { sref, .. }
            | StalkerCmd::DeleteDividend { sref, .. }
            | StalkerCmd::DeleteAlarm { sref, .. }
            | StalkerCmd::FollowSector { sref, .. }
            | StalkerCmd::UnfollowSector { sref, .. } => Some(sref),
            StalkerCmd::AddHolding { holding, .. } | StalkerCmd::EditHolding { holding, .. } => {
                Some(&holding.sref)
            }
            StalkerCmd::AddTrade { trade, .. } => Some(&trade.sref),
            StalkerCmd::AddOrder { order, .. } => Some(&order.sref),
            StalkerCmd::AddDividend { dividend, .. } => Some(&dividend.sref),
            StalkerCmd::AddAlarm(alarm) => Some(&alarm.sref),
        }
    }

    /// Wire verb of the command.
    pub fn verb(&self) -> &'static str {
        match self {
            StalkerCmd::AddPortfolio { .. } => "Add-Portfolio",
            StalkerCmd::EditPortfolio { .. } => "Edit-Portfolio",
            StalkerCmd::DeletePortfolio { .. } => "Delete-Portfolio",
            StalkerCmd::FollowPortfolio { .. } => "Follow-Portfolio",
            StalkerCmd::UnfollowPortfolio { .. } => "Unfollow-Portfolio",
            StalkerCmd::AddHolding { .. } => "Add-Holding",
            StalkerCmd::EditHolding { .. } => "Edit-Holding",
            StalkerCmd::DeleteHolding { .. } => "Delete-Holding",
            StalkerCmd::AddTrade { .. } => "Add-Trade",
            StalkerCmd::DeleteTrade { .. } => "Delete-Trade",
            StalkerCmd::AddOrder { .. } => "Add-Order",
            StalkerCmd::FillOrder { .. } => "Fill-Order",
            StalkerCmd::DeleteOrder { .. } => "Delete-Order",
            StalkerCmd::AddDividend { .. } => "Add-Divident",
            StalkerCmd::DeleteDividend { .. } => "Delete-Divident",
            StalkerCmd::AddAlarm(_) => "Add-Alarm",
            StalkerCmd::DeleteAlarm { .. } => "Delete-Alarm",
            StalkerCmd::SetSector { .. } => "Set-Sector",
            StalkerCmd::EditSector { .. } => "Edit-Sector",
            StalkerCmd::DeleteSector { .. } => "Delete-Sector",
            StalkerCmd::FollowSector { .. } => "Follow-Sector",
            StalkerCmd::UnfollowSector { .. } => "Unfollow-Sector",
        }
    }
}
