//! The raw many-to-many crosswalk relation.
//!
//! Stored as a flat edge list with per-source index vectors (arena-style
//! indices rather than nested objects), so that:
//!
//! - fan-out and fan-in are preserved exactly as supplied
//! - mass-conservation checks reduce to sums over a flat table
//! - manually curated edges merge in as ordinary edges

use std::collections::{BTreeSet, HashMap};

use crate::domain::{CrosswalkEdge, SourceCode, TargetCode};

#[derive(Debug, Clone)]
pub struct CrosswalkRelation {
    edges: Vec<CrosswalkEdge>,
    by_source: HashMap<SourceCode, Vec<usize>>,
    duplicate_count: usize,
}

impl CrosswalkRelation {
    /// Build the relation from table-derived edges plus manually curated
    /// ones. Exact (source, target) duplicates are collapsed, first
    /// occurrence wins; a duplicate edge would otherwise double that
    /// target's share of the source's weight.
    pub fn from_edges(
        table_edges: impl IntoIterator<Item = CrosswalkEdge>,
        manual_edges: impl IntoIterator<Item = CrosswalkEdge>,
    ) -> Self {
        let mut edges: Vec<CrosswalkEdge> = Vec::new();
        let mut by_source: HashMap<SourceCode, Vec<usize>> = HashMap::new();
        let mut seen: BTreeSet<(SourceCode, TargetCode)> = BTreeSet::new();
        let mut duplicate_count = 0usize;

        for edge in table_edges.into_iter().chain(manual_edges) {
            if !seen.insert((edge.source, edge.target)) {
                duplicate_count += 1;
                continue;
            }
            by_source.entry(edge.source).or_default().push(edges.len());
            edges.push(edge);
        }

        Self {
            edges,
            by_source,
            duplicate_count,
        }
    }

    pub fn edges(&self) -> &[CrosswalkEdge] {
        &self.edges
    }

    /// Outgoing edges of one source code, in insertion order.
    pub fn outgoing(&self, source: SourceCode) -> impl Iterator<Item = &CrosswalkEdge> {
        self.by_source
            .get(&source)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// All source codes with at least one outgoing edge, sorted.
    pub fn sources(&self) -> Vec<SourceCode> {
        let mut out: Vec<SourceCode> = self.by_source.keys().copied().collect();
        out.sort();
        out
    }

    pub fn contains_source(&self, source: SourceCode) -> bool {
        self.by_source.contains_key(&source)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn source_count(&self) -> usize {
        self.by_source.len()
    }

    /// How many exact duplicates were collapsed at build time.
    pub fn duplicate_count(&self) -> usize {
        self.duplicate_count
    }
}
