//! Shared pipeline logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! relation build -> weight derivation -> expansion -> aggregation -> coverage
//!
//! The CLI handlers then focus on presentation (printing vs exports).

use std::collections::HashMap;

use crate::aggregate::aggregate_by_target;
use crate::crosswalk::{derive_split_weights, BaseTotals, CrosswalkRelation, ProbabilisticMapping};
use crate::diagnostics::{coverage_report, CoverageReport};
use crate::domain::{
    AggregateResult, CategoryTotal, CrosswalkEdge, SourceCode, TargetCode, WeightedRecord,
};
use crate::error::AppError;
use crate::expand::{expand_records, Expansion};

/// Everything the pipeline consumes. Records must already have sentinel
/// rows filtered out (ingest does this for CSVs; `split_sentinel` does it
/// for in-memory data).
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub edges: Vec<CrosswalkEdge>,
    pub manual_edges: Vec<CrosswalkEdge>,
    pub titles: HashMap<TargetCode, String>,
    pub totals: Vec<CategoryTotal>,
    pub records: Vec<WeightedRecord>,
}

/// Headline counts for the run summary.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub edge_count: usize,
    pub duplicate_edge_count: usize,
    pub source_count: usize,
    pub base_target_count: usize,
    pub record_count: usize,
}

/// All computed outputs of a single run.
#[derive(Debug)]
pub struct RunOutput {
    pub mapping: ProbabilisticMapping,
    pub expansion: Expansion,
    pub results: Vec<AggregateResult>,
    pub coverage: CoverageReport,
    pub stats: RunStats,
    pub base_period: u16,
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_pipeline(
    inputs: PipelineInputs,
    base_period: u16,
    top_n: usize,
) -> Result<RunOutput, AppError> {
    if inputs.records.is_empty() {
        return Err(AppError::no_data("No weighted records to process."));
    }

    // 1) Build the relation (manual edges merge as ordinary edges).
    let relation = CrosswalkRelation::from_edges(inputs.edges, inputs.manual_edges);

    // 2) Select the base period out of the totals table.
    let totals = BaseTotals::from_totals(&inputs.totals, base_period)?;

    // 3) Derive empirical split weights.
    let mapping = derive_split_weights(&relation, &totals)?;

    // 4) Expand records through the mapping (mass-conserving join).
    let expansion = expand_records(&inputs.records, &mapping)?;

    // 5) Aggregate per target.
    let results = aggregate_by_target(&expansion.records, &inputs.titles);

    // 6) Coverage audit over the same inputs/outputs.
    let coverage = coverage_report(&expansion, &mapping, &totals, &inputs.titles, top_n);

    let stats = RunStats {
        edge_count: relation.edge_count(),
        duplicate_edge_count: relation.duplicate_count(),
        source_count: relation.source_count(),
        base_target_count: totals.len(),
        record_count: inputs.records.len(),
    };

    Ok(RunOutput {
        mapping,
        expansion,
        results,
        coverage,
        stats,
        base_period,
    })
}

/// Split off sentinel ("no field reported") records from an in-memory set.
///
/// Returns the kept records plus (sentinel count, sentinel weight).
pub fn split_sentinel(
    records: Vec<WeightedRecord>,
    sentinel: u32,
) -> (Vec<WeightedRecord>, usize, f64) {
    let mut kept = Vec::with_capacity(records.len());
    let mut count = 0usize;
    let mut weight = 0.0;
    for record in records {
        if record.source == SourceCode(sentinel) {
            count += 1;
            weight += record.weight;
        } else {
            kept.push(record);
        }
    }
    (kept, count, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NanReason, Provenance};

    fn edge(source: u32, target: u32) -> CrosswalkEdge {
        CrosswalkEdge {
            source: SourceCode(source),
            target: TargetCode(target),
            provenance: Provenance::FromTable,
            note: None,
        }
    }

    fn total(target: u32, mass: f64) -> CategoryTotal {
        CategoryTotal {
            target: TargetCode(target),
            period: 2019,
            mass,
        }
    }

    fn record(source: u32, weight: f64, score: f64) -> WeightedRecord {
        WeightedRecord {
            source: SourceCode(source),
            weight,
            score,
        }
    }

    /// One run covering the main outcomes: a 3000/1000 split, an
    /// unweighable source, an all-missing-score target, and a near-zero
    /// weight target.
    #[test]
    fn pipeline_end_to_end() {
        let inputs = PipelineInputs {
            edges: vec![edge(1, 10), edge(1, 11), edge(2, 12), edge(3, 13), edge(4, 14)],
            manual_edges: vec![],
            titles: HashMap::from([(TargetCode(10), "T1".to_string())]),
            totals: vec![
                total(10, 3000.0),
                total(11, 1000.0),
                total(12, 0.0),   // source 2 becomes unweighable
                total(13, 500.0),
                total(14, 700.0),
            ],
            records: vec![
                record(1, 40.0, 0.8),
                record(2, 17.0, 0.2),        // dropped with source 2
                record(3, 500.0, f64::NAN),  // target 13: all scores missing
                record(4, 1e-12, 0.5),       // target 14: near-zero weight
            ],
        };

        let output = run_pipeline(inputs, 2019, 10).unwrap();

        // Weight 40 splits 30/10 across mass 3000/1000.
        let t10 = output
            .results
            .iter()
            .find(|r| r.target == TargetCode(10))
            .unwrap();
        let t11 = output
            .results
            .iter()
            .find(|r| r.target == TargetCode(11))
            .unwrap();
        assert!((t10.total_weight - 30.0).abs() < 1e-9);
        assert!((t11.total_weight - 10.0).abs() < 1e-9);
        assert!((t10.mean_score - 0.8).abs() < 1e-12);
        assert_eq!(t10.title.as_deref(), Some("T1"));

        // Source 2 is unweighable; its target never aggregates.
        assert!(output.results.iter().all(|r| r.target != TargetCode(12)));
        assert_eq!(output.coverage.unweighable_sources.len(), 1);
        assert_eq!(output.coverage.unmapped_sources[0].source, SourceCode(2));

        // Target 13: positive weight, all scores missing.
        let t13 = output
            .results
            .iter()
            .find(|r| r.target == TargetCode(13))
            .unwrap();
        assert!(t13.mean_score.is_nan());
        assert_eq!(t13.nan_reason, Some(NanReason::AllScoresMissing));
        assert!((t13.total_weight - 500.0).abs() < 1e-9);

        // Target 14: near-zero weight, no exception.
        let t14 = output
            .results
            .iter()
            .find(|r| r.target == TargetCode(14))
            .unwrap();
        assert!(t14.mean_score.is_nan());
        assert_eq!(t14.nan_reason, Some(NanReason::ZeroTotalWeight));
    }

    #[test]
    fn empty_records_is_a_no_data_error() {
        let inputs = PipelineInputs {
            edges: vec![edge(1, 10)],
            manual_edges: vec![],
            titles: HashMap::new(),
            totals: vec![total(10, 1.0)],
            records: vec![],
        };
        assert_eq!(run_pipeline(inputs, 2019, 10).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn missing_base_period_is_an_input_error() {
        let inputs = PipelineInputs {
            edges: vec![edge(1, 10)],
            manual_edges: vec![],
            titles: HashMap::new(),
            totals: vec![total(10, 1.0)], // period 2019
            records: vec![record(1, 1.0, 0.5)],
        };
        assert_eq!(run_pipeline(inputs, 1999, 10).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn split_sentinel_filters_and_tallies() {
        let (kept, count, weight) = split_sentinel(
            vec![record(0, 5.0, 0.1), record(1, 2.0, 0.2), record(0, 3.0, 0.3)],
            0,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(count, 2);
        assert!((weight - 8.0).abs() < 1e-12);
    }
}
