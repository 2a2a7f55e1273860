//! Markdown valuation report.
//!
//! One table per portfolio followed by a grand totals table. Amounts are in
//! the report's home currency.

use crate::domain::error::StalkerError;
use crate::domain::report::{PortfolioReport, Report, ReportRow, ReportTotals};
use crate::ports::report_port::ReportPort;

pub struct TextReportAdapter;

fn fmt_money(value: f64) -> String {
    if value >= 0.0 {
        format!("{:.2}", value)
    } else {
        format!("-{:.2}", value.abs())
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(fmt_money).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_sectors(row: &ReportRow) -> String {
    row.sectors
        .iter()
        .map(|(sector, field)| format!("{sector}: {field}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_row(row: &ReportRow) -> String {
    let stale = if row.price_is_current { "" } else { " *" };
    format!(
        "| {} | {:.2} | {} | {}{} | {} | {} | {:.1}% | {} | {} | {} |\n",
        row.sref,
        row.units,
        fmt_money(row.invested),
        fmt_opt(row.market_value),
        stale,
        fmt_opt(row.gain),
        fmt_opt(row.today_change),
        row.allocation_pct,
        fmt_money(row.realized_gain),
        fmt_money(row.dividends),
        fmt_sectors(row),
    )
}

fn render_totals(totals: &ReportTotals) -> String {
    let mut output = String::from("| Total | Value |\n| --- | --- |\n");
    output.push_str(&format!("| Invested | {} |\n", fmt_money(totals.invested)));
    output.push_str(&format!(
        "| Market Value | {} |\n",
        fmt_money(totals.market_value)
    ));
    output.push_str(&format!(
        "| Gain | {} ({:.2}%) |\n",
        fmt_money(totals.gain),
        totals.gain_pct()
    ));
    output.push_str(&format!(
        "| Today | {} |\n",
        fmt_money(totals.today_change)
    ));
    output.push_str(&format!(
        "| Realized | {} |\n",
        fmt_money(totals.realized_gain)
    ));
    output.push_str(&format!("| Dividends | {} |\n", fmt_money(totals.dividends)));
    if totals.missing_prices > 0 {
        output.push_str(&format!(
            "| Missing Prices | {} |\n",
            totals.missing_prices
        ));
    }
    output
}

fn render_portfolio(portfolio: &PortfolioReport) -> String {
    let mut output = format!("## {}\n\n", portfolio.name);
    if portfolio.rows.is_empty() {
        output.push_str("No positions.\n\n");
    } else {
        output.push_str(
            "| Stock | Units | Invested | Value | Gain | Today | Alloc | Realized | Dividends | Sectors |\n",
        );
        output.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: | ---: | ---: | --- |\n");
        for row in &portfolio.rows {
            output.push_str(&render_row(row));
        }
        output.push('\n');
    }
    output.push_str(&render_totals(&portfolio.totals));
    output.push('\n');
    output
}

pub fn render(report: &Report) -> String {
    let mut output = format!("# Portfolio Report ({})\n\n", report.home_currency);
    for portfolio in &report.portfolios {
        output.push_str(&render_portfolio(portfolio));
    }
    output.push_str("## All Portfolios\n\n");
    output.push_str(&render_totals(&report.totals));
    if report
        .portfolios
        .iter()
        .flat_map(|p| &p.rows)
        .any(|r| !r.price_is_current)
    {
        output.push_str("\n\\* price predates the market's last close\n");
    }
    output
}

impl ReportPort for TextReportAdapter {
    fn write(&self, report: &Report, output: &mut dyn std::io::Write) -> Result<(), StalkerError> {
        output.write_all(render(report).as_bytes())?;
        Ok(())
    }
}
