//! Coverage diagnostics.
//!
//! Pure reporting over the pipeline's inputs and outputs; nothing here
//! mutates other components' data, and persistence/display belongs to the
//! caller. Three ordered reports:
//!
//! (a) source codes present in the records but absent from the
//!     probabilistic mapping, ranked by the respondent weight they carry
//! (b) target codes with positive base-period mass that no source maps to,
//!     ranked by that mass
//! (c) the top-N of (a) with each source's share of total record weight,
//!     for prioritizing manual crosswalk curation

use std::collections::HashMap;

use serde::Serialize;

use crate::crosswalk::{BaseTotals, DroppedEdge, ProbabilisticMapping, UnweighableSource};
use crate::domain::{SourceCode, TargetCode};
use crate::expand::{Expansion, UnmappedSource};

/// Report (b) row: reachable population mass the mapping never reaches.
#[derive(Debug, Clone, Serialize)]
pub struct UnmappedTarget {
    pub target: TargetCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub base_mass: f64,
}

/// Report (c) row: a curation candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CurationCandidate {
    pub source: SourceCode,
    pub total_weight: f64,
    pub record_count: usize,
    /// Fraction of total record weight this source represents.
    pub weight_share: f64,
}

/// All three reports plus the derivation audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// (a) — ranked descending by lost respondent weight.
    pub unmapped_sources: Vec<UnmappedSource>,
    /// (b) — ranked descending by base-period mass.
    pub unmapped_targets: Vec<UnmappedTarget>,
    /// (c) — top-N of (a) with weight shares.
    pub curation_candidates: Vec<CurationCandidate>,

    /// Sources the weight derivation could not weight at all.
    pub unweighable_sources: Vec<UnweighableSource>,
    /// Edges dropped during derivation (missing or zero base mass).
    pub dropped_edges: Vec<DroppedEdge>,

    pub total_record_weight: f64,
    pub unmapped_record_weight: f64,
}

/// Build the coverage report for one run.
pub fn coverage_report(
    expansion: &Expansion,
    mapping: &ProbabilisticMapping,
    totals: &BaseTotals,
    titles: &HashMap<TargetCode, String>,
    top_n: usize,
) -> CoverageReport {
    // (a) is already tallied and ranked by the expander.
    let unmapped_sources = expansion.unmapped.clone();

    // (b): positive-mass targets outside the mapping's reachable set.
    let reachable = mapping.target_set();
    let mut unmapped_targets: Vec<UnmappedTarget> = totals
        .targets()
        .filter(|(target, mass)| *mass > 0.0 && !reachable.contains(target))
        .map(|(target, base_mass)| UnmappedTarget {
            target,
            title: titles.get(&target).cloned(),
            base_mass,
        })
        .collect();
    unmapped_targets.sort_by(|a, b| {
        b.base_mass
            .partial_cmp(&a.base_mass)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.target.cmp(&b.target))
    });

    // (c): weight share is relative to *all* record weight, mapped or not.
    let total_record_weight = expansion.input_weight;
    let curation_candidates = unmapped_sources
        .iter()
        .take(top_n)
        .map(|u| CurationCandidate {
            source: u.source,
            total_weight: u.total_weight,
            record_count: u.record_count,
            weight_share: if total_record_weight > 0.0 {
                u.total_weight / total_record_weight
            } else {
                0.0
            },
        })
        .collect();

    let unmapped_record_weight = expansion.unmapped_weight();

    CoverageReport {
        unmapped_sources,
        unmapped_targets,
        curation_candidates,
        unweighable_sources: mapping.unweighable.clone(),
        dropped_edges: mapping.dropped_edges.clone(),
        total_record_weight,
        unmapped_record_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::{derive_split_weights, CrosswalkRelation};
    use crate::domain::{CategoryTotal, CrosswalkEdge, Provenance, WeightedRecord};
    use crate::expand::expand_records;

    fn build(
        edges: Vec<(u32, u32)>,
        totals: Vec<(u32, f64)>,
        records: Vec<(u32, f64)>,
        top_n: usize,
    ) -> CoverageReport {
        let relation = CrosswalkRelation::from_edges(
            edges.into_iter().map(|(s, t)| CrosswalkEdge {
                source: SourceCode(s),
                target: TargetCode(t),
                provenance: Provenance::FromTable,
                note: None,
            }),
            vec![],
        );
        let totals: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(t, mass)| CategoryTotal {
                target: TargetCode(t),
                period: 2019,
                mass,
            })
            .collect();
        let base = BaseTotals::from_totals(&totals, 2019).unwrap();
        let mapping = derive_split_weights(&relation, &base).unwrap();
        let records: Vec<WeightedRecord> = records
            .into_iter()
            .map(|(s, w)| WeightedRecord {
                source: SourceCode(s),
                weight: w,
                score: 0.5,
            })
            .collect();
        let expansion = expand_records(&records, &mapping).unwrap();
        coverage_report(&expansion, &mapping, &base, &HashMap::new(), top_n)
    }

    #[test]
    fn unmapped_sources_ranked_by_weight() {
        let report = build(
            vec![(1, 10)],
            vec![(10, 100.0)],
            vec![(1, 5.0), (7, 10.0), (8, 90.0)],
            10,
        );
        let sources: Vec<u32> = report
            .unmapped_sources
            .iter()
            .map(|u| u.source.0)
            .collect();
        assert_eq!(sources, vec![8, 7]);
    }

    #[test]
    fn unmapped_targets_ranked_by_mass_zero_mass_excluded() {
        // Targets 20 and 30 have mass but no incoming edge; 40 has zero
        // mass and must not appear.
        let report = build(
            vec![(1, 10)],
            vec![(10, 100.0), (20, 50.0), (30, 500.0), (40, 0.0)],
            vec![(1, 1.0)],
            10,
        );
        let targets: Vec<u32> = report
            .unmapped_targets
            .iter()
            .map(|u| u.target.0)
            .collect();
        assert_eq!(targets, vec![30, 20]);
    }

    #[test]
    fn curation_candidates_carry_weight_share() {
        let report = build(
            vec![(1, 10)],
            vec![(10, 100.0)],
            vec![(1, 20.0), (7, 80.0)],
            10,
        );
        assert_eq!(report.curation_candidates.len(), 1);
        let c = &report.curation_candidates[0];
        assert_eq!(c.source, SourceCode(7));
        assert!((c.weight_share - 0.8).abs() < 1e-12);
        assert!((report.total_record_weight - 100.0).abs() < 1e-12);
        assert!((report.unmapped_record_weight - 80.0).abs() < 1e-12);
    }

    #[test]
    fn top_n_truncates_candidates_but_not_the_full_list() {
        let report = build(
            vec![(1, 10)],
            vec![(10, 100.0)],
            vec![(5, 1.0), (6, 2.0), (7, 3.0), (8, 4.0)],
            2,
        );
        assert_eq!(report.unmapped_sources.len(), 4);
        assert_eq!(report.curation_candidates.len(), 2);
        assert_eq!(report.curation_candidates[0].source, SourceCode(8));
    }

    #[test]
    fn unweighable_sources_surface_in_the_report() {
        // Source 2's only target has zero mass.
        let report = build(
            vec![(1, 10), (2, 40)],
            vec![(10, 100.0), (40, 0.0)],
            vec![(1, 1.0), (2, 3.0)],
            10,
        );
        assert_eq!(report.unweighable_sources.len(), 1);
        assert_eq!(report.unweighable_sources[0].source, SourceCode(2));
        // Their records also show up as unmapped weight.
        assert_eq!(report.unmapped_sources.len(), 1);
        assert_eq!(report.unmapped_sources[0].source, SourceCode(2));
    }
}
