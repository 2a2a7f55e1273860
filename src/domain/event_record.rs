//! Compact persisted form of analytic events.
//!
//! A record is an ordered list of typed fields, stored as `CODE=VALUE` pairs
//! joined by the ASCII unit separator. Numbers carry two decimals and dates
//! are six-digit `yymmdd` codes.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use strum::{Display, EnumIter, EnumString};

use crate::domain::error::EventRecordError;
use crate::domain::sref::SRef;

pub const FIELD_SEPARATOR: char = '\u{1F}';
const DATE_CODE_FORMAT: &str = "%y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum EventType {
    HoldingAvgCrossedDown,
    HoldingAvgCrossedUp,
    HoldingOldestCrossedDown,
    HoldingOldestCrossedUp,
}

/// One natively typed record field.
#[derive(Debug, Clone, PartialEq)]
pub enum EventField {
    Type(EventType),
    Date(NaiveDate),
    Portfolio(String),
    SRef(SRef),
    Value(f64),
    Close(f64),
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl EventField {
    pub fn code(&self) -> &'static str {
        match self {
            EventField::Type(_) => "T",
            EventField::Date(_) => "D",
            EventField::Portfolio(_) => "P",
            EventField::SRef(_) => "S",
            EventField::Value(_) => "V",
            EventField::Close(_) => "C",
        }
    }

    fn decode(code: &str, value: &str) -> Result<Self, EventRecordError> {
        let invalid = || EventRecordError::InvalidValue {
            code: code.to_string(),
            value: value.to_string(),
        };
        let number = || value.parse::<f64>().map(round2).map_err(|_| invalid());
        let field = match code {
            "T" => EventField::Type(EventType::from_str(value).map_err(|_| invalid())?),
            "D" => {
                if value.len() != 6 {
                    return Err(invalid());
                }
                EventField::Date(
                    NaiveDate::parse_from_str(value, DATE_CODE_FORMAT).map_err(|_| invalid())?,
                )
            }
            "P" => EventField::Portfolio(value.to_string()),
            "S" => EventField::SRef(SRef::from_str(value).map_err(|_| invalid())?),
            "V" => EventField::Value(number()?),
            "C" => EventField::Close(number()?),
            other => return Err(EventRecordError::UnknownCode(other.to_string())),
        };
        Ok(field)
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.code())?;
        match self {
            EventField::Type(t) => write!(f, "{t}"),
            EventField::Date(d) => write!(f, "{}", d.format(DATE_CODE_FORMAT)),
            EventField::Portfolio(p) => write!(f, "{p}"),
            EventField::SRef(s) => write!(f, "{s}"),
            EventField::Value(v) | EventField::Close(v) => write!(f, "{v:.2}"),
        }
    }
}

/// An immutable analytic event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    fields: Vec<EventField>,
}

impl EventRecord {
    /// Numeric fields are rounded to two decimals here, so a record equals
    /// its decoded encoding.
    pub fn new(fields: Vec<EventField>) -> Self {
        let fields = fields
            .into_iter()
            .map(|field| match field {
                EventField::Value(v) => EventField::Value(round2(v)),
                EventField::Close(v) => EventField::Close(round2(v)),
                other => other,
            })
            .collect();
        EventRecord { fields }
    }

    /// The record shape emitted by the threshold scan.
    pub fn holding_event(
        event_type: EventType,
        date: NaiveDate,
        portfolio: &str,
        sref: &SRef,
        cost: f64,
        close: f64,
    ) -> Self {
        EventRecord::new(vec![
            EventField::Type(event_type),
            EventField::Date(date),
            EventField::Portfolio(portfolio.to_string()),
            EventField::SRef(sref.clone()),
            EventField::Value(cost),
            EventField::Close(close),
        ])
    }

    pub fn fields(&self) -> &[EventField] {
        &self.fields
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.fields.iter().find_map(|f| match f {
            EventField::Type(t) => Some(*t),
            _ => None,
        })
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.fields.iter().find_map(|f| match f {
            EventField::Date(d) => Some(*d),
            _ => None,
        })
    }

    pub fn portfolio(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            EventField::Portfolio(p) => Some(p.as_str()),
            _ => None,
        })
    }

    pub fn sref(&self) -> Option<&SRef> {
        self.fields.iter().find_map(|f| match f {
            EventField::SRef(s) => Some(s),
            _ => None,
        })
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.iter().find_map(|f| match f {
            EventField::Value(v) => Some(*v),
            _ => None,
        })
    }

    pub fn close(&self) -> Option<f64> {
        self.fields.iter().find_map(|f| match f {
            EventField::Close(v) => Some(*v),
            _ => None,
        })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(line: &str) -> Result<Self, EventRecordError> {
        line.parse()
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "{FIELD_SEPARATOR}")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl FromStr for EventRecord {
    type Err = EventRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(EventRecordError::Empty);
        }
        let fields = s
            .split(FIELD_SEPARATOR)
            .map(|part| {
                let (code, value) = part
                    .split_once('=')
                    .ok_or_else(|| EventRecordError::MalformedField(part.to_string()))?;
                EventField::decode(code, value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EventRecord { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketId;
    use strum::IntoEnumIterator;

    fn sample() -> EventRecord {
        EventRecord::new(vec![
            EventField::Type(EventType::HoldingAvgCrossedDown),
            EventField::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            EventField::Portfolio("Growth".into()),
            EventField::SRef(SRef::new(MarketId::Nasdaq, "MSFT")),
            EventField::Value(100.456),
        ])
    }

    #[test]
    fn encoded_form() {
        let encoded = sample().encode();
        let parts: Vec<&str> = encoded.split(FIELD_SEPARATOR).collect();
        assert_eq!(
            parts,
            vec![
                "T=HoldingAvgCrossedDown",
                "D=240305",
                "P=Growth",
                "S=NASDAQ$MSFT",
                "V=100.46",
            ]
        );
    }

    #[test]
    fn decode_reproduces_rounded_record() {
        let record = sample();
        let decoded = EventRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.value(), Some(100.46));
        assert_eq!(decoded.portfolio(), Some("Growth"));
        assert_eq!(decoded.event_type(), Some(EventType::HoldingAvgCrossedDown));
    }

    #[test]
    fn unknown_code_is_an_error() {
        let line = format!("T=HoldingAvgCrossedUp{FIELD_SEPARATOR}X=1");
        assert_eq!(
            EventRecord::decode(&line).unwrap_err(),
            EventRecordError::UnknownCode("X".into())
        );
    }

    #[test]
    fn malformed_input() {
        assert_eq!(EventRecord::decode("").unwrap_err(), EventRecordError::Empty);
        assert!(matches!(
            EventRecord::decode("T").unwrap_err(),
            EventRecordError::MalformedField(_)
        ));
        assert!(matches!(
            EventRecord::decode("D=2024-03-05").unwrap_err(),
            EventRecordError::InvalidValue { .. }
        ));
        assert!(matches!(
            EventRecord::decode("V=abc").unwrap_err(),
            EventRecordError::InvalidValue { .. }
        ));
    }

    #[test]
    fn every_event_type_decodes() {
        for t in EventType::iter() {
            let record = EventRecord::new(vec![EventField::Type(t)]);
            assert_eq!(EventRecord::decode(&record.encode()).unwrap().event_type(), Some(t));
        }
    }

    #[test]
    fn portfolio_names_may_contain_spaces() {
        let record = EventRecord::new(vec![EventField::Portfolio("Long Term".into())]);
        assert_eq!(
            EventRecord::decode(&record.encode()).unwrap().portfolio(),
            Some("Long Term")
        );
    }
}
