//! Screening report port.

use crate::domain::error::SiegfriedError;
use crate::domain::screener::ScreenReport;

/// Port for persisting screening results.
pub trait ReportPort {
    fn write_picks(&self, report: &ScreenReport, output_path: &str) -> Result<(), SiegfriedError>;

    /// Writes one row per skipped ticker with its reason.
    fn write_skipped(&self, report: &ScreenReport, output_path: &str) -> Result<(), SiegfriedError>;
}
