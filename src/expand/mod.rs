//! Weighted record expansion.
//!
//! Inner-joins respondent records against the probabilistic mapping: one
//! expanded record per (respondent, target) pair, with
//! `weight = raw_weight × split_weight`. The multiply is what prevents the
//! classic many-to-many defect where raw weight is duplicated unscaled
//! across siblings and total population mass explodes by the fan-out.
//!
//! Mass conservation is verified per record: the expanded weights of one
//! respondent must sum back to the raw weight within tolerance, or the run
//! halts (that is a logic defect, not a data condition).
//!
//! Records are independent, so the join runs in parallel over the record
//! slice; per-record output order is preserved, keeping floating-point
//! sums reproducible across runs.

use rayon::prelude::*;
use serde::Serialize;

use crate::crosswalk::ProbabilisticMapping;
use crate::domain::{ExpandedRecord, SourceCode, WeightedRecord, INVARIANT_TOL};
use crate::error::AppError;

/// A source code seen in the records but absent from the probabilistic
/// mapping (either never in the crosswalk, or unweighable).
#[derive(Debug, Clone, Serialize)]
pub struct UnmappedSource {
    pub source: SourceCode,
    /// Total raw respondent weight lost at this source.
    pub total_weight: f64,
    pub record_count: usize,
}

/// Expansion output plus the bookkeeping the diagnostics need.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub records: Vec<ExpandedRecord>,
    /// Sources dropped at the join, descending by lost weight.
    pub unmapped: Vec<UnmappedSource>,
    /// Total raw weight across all input records.
    pub input_weight: f64,
    /// Raw weight of records that did expand.
    pub mapped_weight: f64,
}

impl Expansion {
    pub fn unmapped_weight(&self) -> f64 {
        self.unmapped.iter().map(|u| u.total_weight).sum()
    }
}

enum RecordOutcome {
    Expanded(Vec<ExpandedRecord>),
    Unmapped { source: SourceCode, weight: f64 },
}

/// Expand every record through the mapping.
pub fn expand_records(
    records: &[WeightedRecord],
    mapping: &ProbabilisticMapping,
) -> Result<Expansion, AppError> {
    let outcomes: Vec<Result<RecordOutcome, AppError>> = records
        .par_iter()
        .map(|record| expand_one(record, mapping))
        .collect();

    let mut expanded: Vec<ExpandedRecord> = Vec::new();
    let mut unmapped: std::collections::BTreeMap<SourceCode, (f64, usize)> =
        std::collections::BTreeMap::new();
    let mut input_weight = 0.0;
    let mut mapped_weight = 0.0;

    for (record, outcome) in records.iter().zip(outcomes) {
        input_weight += record.weight;
        match outcome? {
            RecordOutcome::Expanded(rows) => {
                mapped_weight += record.weight;
                expanded.extend(rows);
            }
            RecordOutcome::Unmapped { source, weight } => {
                let entry = unmapped.entry(source).or_insert((0.0, 0));
                entry.0 += weight;
                entry.1 += 1;
            }
        }
    }

    let mut unmapped: Vec<UnmappedSource> = unmapped
        .into_iter()
        .map(|(source, (total_weight, record_count))| UnmappedSource {
            source,
            total_weight,
            record_count,
        })
        .collect();
    unmapped.sort_by(|a, b| {
        b.total_weight
            .partial_cmp(&a.total_weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.source.cmp(&b.source))
    });

    Ok(Expansion {
        records: expanded,
        unmapped,
        input_weight,
        mapped_weight,
    })
}

fn expand_one(
    record: &WeightedRecord,
    mapping: &ProbabilisticMapping,
) -> Result<RecordOutcome, AppError> {
    let Some(indices) = mapping.outgoing(record.source) else {
        return Ok(RecordOutcome::Unmapped {
            source: record.source,
            weight: record.weight,
        });
    };

    let mut rows = Vec::with_capacity(indices.len());
    let mut contributed = 0.0;
    for &i in indices {
        let edge = mapping.edge(i);
        let weight = record.weight * edge.split_weight;
        contributed += weight;
        rows.push(ExpandedRecord {
            target: edge.target,
            weight,
            score: record.score,
        });
    }

    // Mass conservation: the expansion must never create or destroy weight.
    let tol = INVARIANT_TOL * record.weight.abs().max(1.0);
    if (contributed - record.weight).abs() > tol {
        return Err(AppError::invariant(format!(
            "Mass conservation violated for source {}: expected {:.12}, got {:.12}.",
            record.source, record.weight, contributed
        )));
    }

    Ok(RecordOutcome::Expanded(rows))
}
