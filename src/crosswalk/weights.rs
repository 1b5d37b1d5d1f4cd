//! Empirical split-weight derivation.
//!
//! Converts the raw crosswalk relation into a probabilistic mapping by
//! attaching to each (source, target) edge the share of base-period
//! population mass its target holds among the source's targets:
//!
//! ```text
//! split_weight(edge) = mass(edge.target) / Σ mass(sibling.target)
//! ```
//!
//! Uniform 1/N splitting would misrepresent population structure whenever
//! sibling targets have wildly different real mass; observed mass is the
//! empirical prior for P(target | source).
//!
//! Edges whose target has no base-period mass (or exactly zero mass) are
//! dropped and reported, never zero-filled. A source whose every edge is
//! dropped is unweighable: excluded from the mapping, surfaced in
//! diagnostics.

use std::collections::HashMap;

use serde::Serialize;

use crate::crosswalk::relation::CrosswalkRelation;
use crate::domain::{
    CategoryTotal, ProbabilisticEdge, SourceCode, TargetCode, INVARIANT_TOL,
};
use crate::error::AppError;

/// Base-period masses, keyed by target code.
#[derive(Debug, Clone)]
pub struct BaseTotals {
    period: u16,
    mass: HashMap<TargetCode, f64>,
}

impl BaseTotals {
    /// Select the base period out of a multi-period totals table.
    ///
    /// Rejects (exit 2): an empty base period, duplicate targets within the
    /// period, and negative or non-finite mass. The totals table is
    /// authoritative; a duplicate or a negative count means the caller's
    /// extract is broken, so we refuse to guess.
    pub fn from_totals(totals: &[CategoryTotal], base_period: u16) -> Result<Self, AppError> {
        let mut mass: HashMap<TargetCode, f64> = HashMap::new();
        for total in totals.iter().filter(|t| t.period == base_period) {
            if !total.mass.is_finite() || total.mass < 0.0 {
                return Err(AppError::input(format!(
                    "Invalid base-period mass for target {}: {} (must be finite and >= 0).",
                    total.target, total.mass
                )));
            }
            if mass.insert(total.target, total.mass).is_some() {
                return Err(AppError::input(format!(
                    "Duplicate base-period total for target {} in period {base_period}.",
                    total.target
                )));
            }
        }
        if mass.is_empty() {
            return Err(AppError::input(format!(
                "No category totals found for base period {base_period}."
            )));
        }
        Ok(Self {
            period: base_period,
            mass,
        })
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn mass(&self, target: TargetCode) -> Option<f64> {
        self.mass.get(&target).copied()
    }

    pub fn targets(&self) -> impl Iterator<Item = (TargetCode, f64)> + '_ {
        self.mass.iter().map(|(&t, &m)| (t, m))
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }
}

/// Why an edge did not survive weight derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    /// The target is absent from the base-period totals.
    MissingTotal,
    /// The target is present but its base-period mass is exactly zero.
    ZeroMass,
}

/// An edge dropped during derivation, kept for the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedEdge {
    pub source: SourceCode,
    pub target: TargetCode,
    pub reason: DropReason,
}

/// A source code none of whose targets carried base-period mass.
#[derive(Debug, Clone, Serialize)]
pub struct UnweighableSource {
    pub source: SourceCode,
    /// How many crosswalk edges the source had before dropping.
    pub edge_count: usize,
}

/// The probabilistic mapping: surviving edges with split weights, plus the
/// audit trail of what was dropped along the way.
#[derive(Debug, Clone)]
pub struct ProbabilisticMapping {
    edges: Vec<ProbabilisticEdge>,
    by_source: HashMap<SourceCode, Vec<usize>>,
    pub dropped_edges: Vec<DroppedEdge>,
    pub unweighable: Vec<UnweighableSource>,
}

impl ProbabilisticMapping {
    pub fn edges(&self) -> &[ProbabilisticEdge] {
        &self.edges
    }

    /// Surviving outgoing edges of one source code.
    pub fn outgoing(&self, source: SourceCode) -> Option<&[usize]> {
        self.by_source.get(&source).map(Vec::as_slice)
    }

    pub fn edge(&self, index: usize) -> &ProbabilisticEdge {
        &self.edges[index]
    }

    pub fn contains_source(&self, source: SourceCode) -> bool {
        self.by_source.contains_key(&source)
    }

    pub fn source_count(&self) -> usize {
        self.by_source.len()
    }

    /// All target codes reachable through the mapping.
    pub fn target_set(&self) -> std::collections::BTreeSet<TargetCode> {
        self.edges.iter().map(|e| e.target).collect()
    }
}

/// Derive split weights for every source in the relation.
///
/// Fails only on an internal invariant violation (exit 4): the split
/// weights of a retained source not summing to 1.0 within tolerance.
/// Incomplete totals are data conditions, recorded in the mapping's audit
/// fields instead.
pub fn derive_split_weights(
    relation: &CrosswalkRelation,
    totals: &BaseTotals,
) -> Result<ProbabilisticMapping, AppError> {
    let mut edges: Vec<ProbabilisticEdge> = Vec::with_capacity(relation.edge_count());
    let mut by_source: HashMap<SourceCode, Vec<usize>> = HashMap::new();
    let mut dropped_edges: Vec<DroppedEdge> = Vec::new();
    let mut unweighable: Vec<UnweighableSource> = Vec::new();

    // Sorted sources keep edge order (and thus reports) reproducible.
    for source in relation.sources() {
        let mut kept: Vec<(&crate::domain::CrosswalkEdge, f64)> = Vec::new();
        let mut edge_count = 0usize;

        for edge in relation.outgoing(source) {
            edge_count += 1;
            match totals.mass(edge.target) {
                None => dropped_edges.push(DroppedEdge {
                    source,
                    target: edge.target,
                    reason: DropReason::MissingTotal,
                }),
                Some(mass) if mass == 0.0 => dropped_edges.push(DroppedEdge {
                    source,
                    target: edge.target,
                    reason: DropReason::ZeroMass,
                }),
                Some(mass) => kept.push((edge, mass)),
            }
        }

        if kept.is_empty() {
            unweighable.push(UnweighableSource { source, edge_count });
            continue;
        }

        let mass_sum: f64 = kept.iter().map(|(_, m)| m).sum();
        let mut split_sum = 0.0;
        let indices = by_source.entry(source).or_default();
        for (edge, mass) in kept {
            let split_weight = mass / mass_sum;
            split_sum += split_weight;
            indices.push(edges.len());
            edges.push(ProbabilisticEdge {
                source: edge.source,
                target: edge.target,
                provenance: edge.provenance,
                split_weight,
            });
        }

        if (split_sum - 1.0).abs() > INVARIANT_TOL {
            return Err(AppError::invariant(format!(
                "Split-weight normalization violated for source {source}: expected 1.0, got {split_sum:.12}."
            )));
        }
    }

    Ok(ProbabilisticMapping {
        edges,
        by_source,
        dropped_edges,
        unweighable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CrosswalkEdge, Provenance};

    fn edge(source: u32, target: u32) -> CrosswalkEdge {
        CrosswalkEdge {
            source: SourceCode(source),
            target: TargetCode(target),
            provenance: Provenance::FromTable,
            note: None,
        }
    }

    fn total(target: u32, period: u16, mass: f64) -> CategoryTotal {
        CategoryTotal {
            target: TargetCode(target),
            period,
            mass,
        }
    }

    #[test]
    fn splits_follow_base_period_mass() {
        // Source 1 maps to targets with mass 3000 and 1000: 0.75 / 0.25.
        let relation = CrosswalkRelation::from_edges(vec![edge(1, 10), edge(1, 11)], vec![]);
        let totals =
            BaseTotals::from_totals(&[total(10, 2019, 3000.0), total(11, 2019, 1000.0)], 2019)
                .unwrap();

        let mapping = derive_split_weights(&relation, &totals).unwrap();
        let indices = mapping.outgoing(SourceCode(1)).unwrap();
        assert_eq!(indices.len(), 2);

        let w10 = mapping
            .edges()
            .iter()
            .find(|e| e.target == TargetCode(10))
            .unwrap()
            .split_weight;
        let w11 = mapping
            .edges()
            .iter()
            .find(|e| e.target == TargetCode(11))
            .unwrap()
            .split_weight;
        assert!((w10 - 0.75).abs() < 1e-12);
        assert!((w11 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn equal_masses_split_equally() {
        let relation = CrosswalkRelation::from_edges(vec![edge(1, 10), edge(1, 11)], vec![]);
        let totals =
            BaseTotals::from_totals(&[total(10, 2019, 500.0), total(11, 2019, 500.0)], 2019)
                .unwrap();
        let mapping = derive_split_weights(&relation, &totals).unwrap();
        for e in mapping.edges() {
            assert!((e.split_weight - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn normalization_holds_for_every_retained_source() {
        let relation = CrosswalkRelation::from_edges(
            vec![
                edge(1, 10),
                edge(1, 11),
                edge(1, 12),
                edge(2, 11),
                edge(2, 13),
            ],
            vec![],
        );
        let totals = BaseTotals::from_totals(
            &[
                total(10, 2019, 123.0),
                total(11, 2019, 4567.0),
                total(12, 2019, 89.0),
                total(13, 2019, 10.0),
            ],
            2019,
        )
        .unwrap();
        let mapping = derive_split_weights(&relation, &totals).unwrap();

        for source in [SourceCode(1), SourceCode(2)] {
            let sum: f64 = mapping
                .outgoing(source)
                .unwrap()
                .iter()
                .map(|&i| mapping.edge(i).split_weight)
                .sum();
            assert!((sum - 1.0).abs() < 1e-9, "source {source}: sum {sum}");
        }
    }

    #[test]
    fn missing_total_drops_edge_but_keeps_source() {
        let relation = CrosswalkRelation::from_edges(vec![edge(1, 10), edge(1, 99)], vec![]);
        let totals = BaseTotals::from_totals(&[total(10, 2019, 100.0)], 2019).unwrap();
        let mapping = derive_split_weights(&relation, &totals).unwrap();

        assert_eq!(mapping.outgoing(SourceCode(1)).unwrap().len(), 1);
        assert!((mapping.edges()[0].split_weight - 1.0).abs() < 1e-12);
        assert_eq!(mapping.dropped_edges.len(), 1);
        assert_eq!(mapping.dropped_edges[0].reason, DropReason::MissingTotal);
    }

    #[test]
    fn zero_mass_only_source_is_unweighable() {
        // Source 2 maps only to a zero-mass target: excluded, with a trace.
        let relation = CrosswalkRelation::from_edges(vec![edge(1, 10), edge(2, 11)], vec![]);
        let totals =
            BaseTotals::from_totals(&[total(10, 2019, 100.0), total(11, 2019, 0.0)], 2019)
                .unwrap();
        let mapping = derive_split_weights(&relation, &totals).unwrap();

        assert!(!mapping.contains_source(SourceCode(2)));
        assert_eq!(mapping.unweighable.len(), 1);
        assert_eq!(mapping.unweighable[0].source, SourceCode(2));
        assert_eq!(mapping.dropped_edges.len(), 1);
        assert_eq!(mapping.dropped_edges[0].reason, DropReason::ZeroMass);
    }

    #[test]
    fn negative_mass_is_rejected() {
        let err = BaseTotals::from_totals(&[total(10, 2019, -5.0)], 2019).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn duplicate_total_is_rejected() {
        let err =
            BaseTotals::from_totals(&[total(10, 2019, 5.0), total(10, 2019, 6.0)], 2019)
                .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn other_periods_are_ignored() {
        let totals = BaseTotals::from_totals(
            &[total(10, 2019, 100.0), total(10, 2024, 900.0)],
            2019,
        )
        .unwrap();
        assert_eq!(totals.mass(TargetCode(10)), Some(100.0));
    }
}
