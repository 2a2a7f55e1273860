//! CSV price file adapter.
//!
//! One file per stock, `<SYMBOL>_<MARKET>.csv`, with a header row and columns
//! `date,open,high,low,close[,volume]`. Rows may be in any order.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::error::StalkerError;
use crate::domain::price_bar::{ClosePoint, PriceBar};
use crate::domain::sref::SRef;
use crate::ports::price_port::{LivePricePort, PriceHistoryPort};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

fn storage(reason: String) -> StalkerError {
    StalkerError::Storage { reason }
}

fn column(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, StalkerError> {
    record
        .get(index)
        .ok_or_else(|| storage(format!("missing {name} column")))?
        .trim()
        .parse()
        .map_err(|e| storage(format!("invalid {name} value: {e}")))
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, sref: &SRef) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", sref.symbol, sref.market))
    }

    fn read_rows(&self, sref: &SRef) -> Result<Vec<CsvRow>, StalkerError> {
        let path = self.csv_path(sref);
        let content = fs::read_to_string(&path)
            .map_err(|e| storage(format!("failed to read {}: {e}", path.display())))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| storage(format!("CSV parse error: {e}")))?;
            let date_str = record
                .get(0)
                .ok_or_else(|| storage("missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| storage(format!("invalid date format: {e}")))?;
            rows.push(CsvRow {
                date,
                open: column(&record, 1, "open")?,
                high: column(&record, 2, "high")?,
                low: column(&record, 3, "low")?,
                close: column(&record, 4, "close")?,
            });
        }
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    /// Rows for `sref`, `None` (with a warning) when the file is missing or
    /// unreadable.
    fn rows_or_warn(&self, sref: &SRef) -> Option<Vec<CsvRow>> {
        match self.read_rows(sref) {
            Ok(rows) if !rows.is_empty() => Some(rows),
            Ok(_) => None,
            Err(e) => {
                warn!(%sref, error = %e, "no price data");
                None
            }
        }
    }
}

impl PriceHistoryPort for CsvPriceAdapter {
    fn last_closes(&self, sref: &SRef, count: usize) -> Option<Vec<ClosePoint>> {
        let rows = self.rows_or_warn(sref)?;
        let start = rows.len().saturating_sub(count);
        Some(
            rows[start..]
                .iter()
                .map(|r| ClosePoint {
                    date: r.date,
                    close: r.close,
                })
                .collect(),
        )
    }
}

impl LivePricePort for CsvPriceAdapter {
    fn latest(&self, sref: &SRef) -> Option<PriceBar> {
        let rows = self.rows_or_warn(sref)?;
        let last = rows.last()?;
        let prev_close = rows
            .len()
            .checked_sub(2)
            .map(|i| rows[i].close)
            .unwrap_or(0.0);
        Some(PriceBar {
            date: last.date,
            open: last.open,
            high: last.high,
            low: last.low,
            close: last.close,
            prev_close,
        })
    }
}
