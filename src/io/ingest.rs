//! CSV ingest and normalization for the three input tables.
//!
//! Turns heterogeneous CSV exports into clean domain rows that are safe to
//! run through the pipeline.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness, no silent fills)
//! - **Separation of concerns**: no crosswalk or aggregation logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{
    CategoryTotal, CrosswalkEdge, Provenance, SourceCode, TargetCode, WeightedRecord,
};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Crosswalk CSV: `source,target[,title][,provenance][,note]`.
#[derive(Debug, Clone)]
pub struct CrosswalkIngest {
    pub edges: Vec<CrosswalkEdge>,
    /// Target titles found alongside the edges (last occurrence wins).
    pub titles: HashMap<TargetCode, String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Totals CSV: `target,period,mass[,title]`.
#[derive(Debug, Clone)]
pub struct TotalsIngest {
    pub totals: Vec<CategoryTotal>,
    pub titles: HashMap<TargetCode, String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Records CSV: `source,weight[,score]`.
#[derive(Debug, Clone)]
pub struct RecordsIngest {
    pub records: Vec<WeightedRecord>,
    /// Rows filtered because their source was the "no field reported"
    /// sentinel. Invalid input, not a mapping gap.
    pub sentinel_count: usize,
    pub sentinel_weight: f64,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

pub fn load_crosswalk(path: &Path) -> Result<CrosswalkIngest, AppError> {
    let mut reader = open_reader(path, "crosswalk CSV")?;
    let header_map = read_header_map(&mut reader, "crosswalk CSV")?;
    require_columns(&header_map, &["source", "target"], "crosswalk CSV")?;

    let mut edges = Vec::new();
    let mut titles = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header line and CSV line
        // numbers are 1-based.
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let parsed = (|| -> Result<CrosswalkEdge, String> {
            let source = parse_code(&record, &header_map, "source")?;
            let target = parse_code(&record, &header_map, "target")?;
            let provenance = match field(&record, &header_map, "provenance") {
                None | Some("") | Some("from-table") | Some("table") => Provenance::FromTable,
                Some("manual") => Provenance::Manual,
                Some(other) => return Err(format!("Unknown provenance '{other}'")),
            };
            let note = field(&record, &header_map, "note")
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            if let Some(title) = field(&record, &header_map, "title").filter(|s| !s.is_empty()) {
                titles.insert(TargetCode(target), title.to_string());
            }
            Ok(CrosswalkEdge {
                source: SourceCode(source),
                target: TargetCode(target),
                provenance,
                note,
            })
        })();
        match parsed {
            Ok(edge) => edges.push(edge),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if edges.is_empty() {
        return Err(AppError::no_data(format!(
            "No usable crosswalk edges in '{}'.",
            path.display()
        )));
    }

    Ok(CrosswalkIngest {
        edges,
        titles,
        row_errors,
        rows_read,
    })
}

pub fn load_category_totals(path: &Path) -> Result<TotalsIngest, AppError> {
    let mut reader = open_reader(path, "totals CSV")?;
    let header_map = read_header_map(&mut reader, "totals CSV")?;
    require_columns(&header_map, &["target", "period", "mass"], "totals CSV")?;

    let mut totals = Vec::new();
    let mut titles = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header line and CSV line
        // numbers are 1-based.
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let parsed = (|| -> Result<CategoryTotal, String> {
            let target = parse_code(&record, &header_map, "target")?;
            let period: u16 = field(&record, &header_map, "period")
                .unwrap_or("")
                .parse()
                .map_err(|_| "Invalid period".to_string())?;
            let mass: f64 = field(&record, &header_map, "mass")
                .unwrap_or("")
                .parse()
                .map_err(|_| "Invalid mass".to_string())?;
            if let Some(title) = field(&record, &header_map, "title").filter(|s| !s.is_empty()) {
                titles.insert(TargetCode(target), title.to_string());
            }
            Ok(CategoryTotal {
                target: TargetCode(target),
                period,
                mass,
            })
        })();
        match parsed {
            Ok(total) => {
                // Negative or non-finite mass is a parsing artifact, not a
                // small total. Reject the file rather than guess.
                if !total.mass.is_finite() || total.mass < 0.0 {
                    return Err(AppError::input(format!(
                        "Invalid mass {} for target {} at line {line} of '{}'.",
                        total.mass,
                        total.target,
                        path.display()
                    )));
                }
                totals.push(total);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if totals.is_empty() {
        return Err(AppError::no_data(format!(
            "No usable category totals in '{}'.",
            path.display()
        )));
    }

    Ok(TotalsIngest {
        totals,
        titles,
        row_errors,
        rows_read,
    })
}

pub fn load_weighted_records(path: &Path, sentinel: u32) -> Result<RecordsIngest, AppError> {
    let mut reader = open_reader(path, "records CSV")?;
    let header_map = read_header_map(&mut reader, "records CSV")?;
    require_columns(&header_map, &["source", "weight"], "records CSV")?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut sentinel_count = 0usize;
    let mut sentinel_weight = 0.0;
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header line and CSV line
        // numbers are 1-based.
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let parsed = (|| -> Result<WeightedRecord, String> {
            let source = parse_code(&record, &header_map, "source")?;
            let weight: f64 = field(&record, &header_map, "weight")
                .unwrap_or("")
                .parse()
                .map_err(|_| "Invalid weight".to_string())?;
            if !weight.is_finite() || weight <= 0.0 {
                return Err(format!("Weight must be a positive real, got {weight}"));
            }
            // Blank / NA score means missing, represented as NaN.
            let score = match field(&record, &header_map, "score") {
                None | Some("") | Some("NA") | Some("na") | Some("NaN") | Some("nan") => f64::NAN,
                Some(raw) => raw.parse().map_err(|_| format!("Invalid score '{raw}'"))?,
            };
            Ok(WeightedRecord {
                source: SourceCode(source),
                weight,
                score,
            })
        })();
        match parsed {
            Ok(rec) if rec.source.0 == sentinel => {
                sentinel_count += 1;
                sentinel_weight += rec.weight;
            }
            Ok(rec) => records.push(rec),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if records.is_empty() {
        return Err(AppError::no_data(format!(
            "No usable weighted records in '{}' (after sentinel filtering).",
            path.display()
        )));
    }

    Ok(RecordsIngest {
        records,
        sentinel_count,
        sentinel_weight,
        row_errors,
        rows_read,
    })
}

fn open_reader(path: &Path, label: &str) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open {label} '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn read_header_map(
    reader: &mut csv::Reader<File>,
    label: &str,
) -> Result<HashMap<String, usize>, AppError> {
    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read {label} headers: {e}")))?;
    Ok(headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect())
}

fn require_columns(
    header_map: &HashMap<String, usize>,
    required: &[&str],
    label: &str,
) -> Result<(), AppError> {
    for column in required {
        if !header_map.contains_key(*column) {
            return Err(AppError::input(format!(
                "{label} is missing required column '{column}'."
            )));
        }
    }
    Ok(())
}

fn field<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    header_map.get(name).and_then(|&i| record.get(i))
}

fn parse_code(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<u32, String> {
    let raw = field(record, header_map, name)
        .ok_or_else(|| format!("Missing '{name}' value"))?;
    raw.parse()
        .map_err(|_| format!("Invalid {name} code '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("xwalk-ingest-{name}-{}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn crosswalk_parses_titles_and_provenance() {
        let path = temp_csv(
            "xw",
            "source,target,title,provenance\n\
             6107,1107,Computer Science,from-table\n\
             6107,1104,Information Systems,\n\
             5501,4509,,manual\n",
        );
        let ingest = load_crosswalk(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(ingest.edges.len(), 3);
        assert_eq!(ingest.edges[2].provenance, Provenance::Manual);
        assert_eq!(
            ingest.titles.get(&TargetCode(1107)).map(String::as_str),
            Some("Computer Science")
        );
        assert!(ingest.row_errors.is_empty());
    }

    #[test]
    fn crosswalk_missing_column_is_schema_error() {
        let path = temp_csv("xw-bad", "source,cip\n1,2\n");
        let err = load_crosswalk(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn totals_reject_negative_mass() {
        let path = temp_csv("tot-neg", "target,period,mass\n1107,2019,-4\n");
        let err = load_category_totals(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn totals_skip_bad_rows_with_row_errors() {
        let path = temp_csv(
            "tot-rows",
            "target,period,mass\n1107,2019,3000\n1104,not-a-year,10\n",
        );
        let ingest = load_category_totals(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(ingest.totals.len(), 1);
        assert_eq!(ingest.row_errors.len(), 1);
        assert_eq!(ingest.row_errors[0].line, 3);
    }

    #[test]
    fn records_filter_sentinel_and_parse_missing_scores() {
        let path = temp_csv(
            "rec",
            "source,weight,score\n\
             6107,40,0.8\n\
             0,55,0.1\n\
             5501,12.5,\n\
             2102,7,NA\n",
        );
        let ingest = load_weighted_records(&path, 0).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(ingest.records.len(), 3);
        assert_eq!(ingest.sentinel_count, 1);
        assert!((ingest.sentinel_weight - 55.0).abs() < 1e-12);
        assert!(ingest.records[1].score_is_missing());
        assert!(ingest.records[2].score_is_missing());
    }

    #[test]
    fn records_reject_non_positive_weight_rows() {
        let path = temp_csv(
            "rec-w",
            "source,weight,score\n6107,0,0.8\n6107,-3,0.8\n6107,10,0.8\n",
        );
        let ingest = load_weighted_records(&path, 0).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(ingest.records.len(), 1);
        assert_eq!(ingest.row_errors.len(), 2);
    }
}
