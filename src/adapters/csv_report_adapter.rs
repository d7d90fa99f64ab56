//! CSV report adapter implementing ReportPort.

use crate::domain::error::SiegfriedError;
use crate::domain::screener::ScreenReport;
use crate::ports::report_port::ReportPort;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SkipRecord<'a> {
    ticker: &'a str,
    reason: &'static str,
    detail: String,
}

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write_picks(&self, report: &ScreenReport, output_path: &str) -> Result<(), SiegfriedError> {
        let mut wtr = csv::Writer::from_path(output_path)?;
        if report.candidates.is_empty() {
            wtr.write_record(["ticker", "roic", "faustmann"])?;
        }
        for candidate in &report.candidates {
            wtr.serialize(candidate)?;
        }
        wtr.flush()?;
        tracing::info!(path = output_path, picks = report.candidates.len(), "picks written");
        Ok(())
    }

    fn write_skipped(
        &self,
        report: &ScreenReport,
        output_path: &str,
    ) -> Result<(), SiegfriedError> {
        let mut wtr = csv::Writer::from_path(output_path)?;
        if report.skipped.is_empty() {
            wtr.write_record(["ticker", "reason", "detail"])?;
        }
        for skipped in &report.skipped {
            wtr.serialize(SkipRecord {
                ticker: &skipped.ticker,
                reason: skipped.reason.kind(),
                detail: skipped.reason.to_string(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::screener::{CandidateResult, CandidateSet, SkipReason, SkippedTicker};
    use std::fs;
    use tempfile::TempDir;

    fn report() -> ScreenReport {
        ScreenReport {
            candidates: CandidateSet::from_unsorted(vec![
                CandidateResult {
                    ticker: "BBB".into(),
                    roic: 1.5,
                    faustmann: 0.6,
                },
                CandidateResult {
                    ticker: "AAA".into(),
                    roic: 2.0,
                    faustmann: 0.25,
                },
            ]),
            skipped: vec![SkippedTicker {
                ticker: "CCC".into(),
                reason: SkipReason::MissingMarketCap,
            }],
            rejected: 1,
            universe_size: 4,
        }
    }

    #[test]
    fn picks_are_written_in_rank_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("picks.csv");
        CsvReportAdapter
            .write_picks(&report(), path.to_str().unwrap())
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "ticker,roic,faustmann");
        assert_eq!(lines[1], "AAA,2.0,0.25");
        assert_eq!(lines[2], "BBB,1.5,0.6");
    }

    #[test]
    fn empty_picks_still_have_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("picks.csv");
        CsvReportAdapter
            .write_picks(&ScreenReport::default(), path.to_str().unwrap())
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "ticker,roic,faustmann");
    }

    #[test]
    fn skipped_rows_carry_reason_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skipped.csv");
        CsvReportAdapter
            .write_skipped(&report(), path.to_str().unwrap())
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("CCC,missing_market_cap,market cap unavailable"));
    }
}
