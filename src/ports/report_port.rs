//! Report output port.

use crate::domain::error::StalkerError;
use crate::domain::report::Report;

/// Port for writing valuation reports.
pub trait ReportPort {
    fn write(&self, report: &Report, output: &mut dyn std::io::Write) -> Result<(), StalkerError>;
}
