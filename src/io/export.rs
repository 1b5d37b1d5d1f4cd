//! Result exports.
//!
//! - aggregate results CSV (easy to consume in spreadsheets or downstream
//!   scripts)
//! - coverage report JSON (the "portable" audit trail for a run)

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::diagnostics::CoverageReport;
use crate::domain::AggregateResult;
use crate::error::AppError;

/// Write the per-target aggregate table to a CSV file.
///
/// A NaN mean is written as an empty cell plus a reason column; downstream
/// tools must see the absence, not a filled-in value.
pub fn write_results_csv(path: &Path, results: &[AggregateResult]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create results CSV '{}': {e}",
            path.display()
        ))
    })?;

    writeln!(file, "target,title,mean_score,nan_reason,total_weight,record_count")
        .map_err(|e| AppError::input(format!("Failed to write results CSV header: {e}")))?;

    for r in results {
        let mean = if r.mean_score.is_nan() {
            String::new()
        } else {
            format!("{:.6}", r.mean_score)
        };
        let reason = r.nan_reason.map(|n| n.display_name()).unwrap_or("");
        writeln!(
            file,
            "{},{},{},{},{:.6},{}",
            r.target,
            csv_escape(r.title.as_deref().unwrap_or("")),
            mean,
            reason,
            r.total_weight,
            r.record_count,
        )
        .map_err(|e| AppError::input(format!("Failed to write results CSV row: {e}")))?;
    }

    Ok(())
}

/// Run context wrapped around the coverage report in the JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageFile<'a> {
    pub tool: &'static str,
    pub base_period: u16,
    pub sentinel_count: usize,
    pub sentinel_weight: f64,
    #[serde(flatten)]
    pub report: &'a CoverageReport,
}

/// Write the coverage report (plus run context) as pretty JSON.
pub fn write_coverage_json(path: &Path, coverage: &CoverageFile<'_>) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create coverage JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, coverage)
        .map_err(|e| AppError::input(format!("Failed to write coverage JSON: {e}")))?;
    Ok(())
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NanReason, TargetCode};

    #[test]
    fn nan_means_export_as_empty_cell_with_reason() {
        let results = vec![
            AggregateResult {
                target: TargetCode(1107),
                title: Some("Computer Science".to_string()),
                mean_score: 0.8123456,
                nan_reason: None,
                total_weight: 1234.5,
                record_count: 10,
            },
            AggregateResult {
                target: TargetCode(4509),
                title: None,
                mean_score: f64::NAN,
                nan_reason: Some(NanReason::AllScoresMissing),
                total_weight: 500.0,
                record_count: 3,
            },
        ];

        let path = std::env::temp_dir().join(format!("xwalk-export-{}.csv", std::process::id()));
        write_results_csv(&path, &results).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1107,Computer Science,0.812346,,"));
        assert!(lines[2].starts_with("4509,,,no non-missing score values,"));
    }

    #[test]
    fn titles_with_commas_are_quoted() {
        assert_eq!(csv_escape("Accounting, General"), "\"Accounting, General\"");
        assert_eq!(csv_escape("Finance"), "Finance");
    }
}
