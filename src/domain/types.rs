//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory while resolving the crosswalk
//! - exported to JSON/CSV
//! - reloaded later for downstream analysis

use serde::{Deserialize, Serialize};

/// Opaque categorical key from the respondent-level taxonomy
/// (e.g. a field-of-study code). Finite domain, no ordering semantics;
/// `Ord` exists only so reports iterate in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCode(pub u32);

/// Opaque categorical key from the destination taxonomy
/// (e.g. a 4-digit program code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetCode(pub u32);

impl std::fmt::Display for SourceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for TargetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a crosswalk edge came from.
///
/// Manually curated edges are appended to the table-derived ones before
/// weight derivation, so the algorithm treats both origins uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    #[default]
    FromTable,
    Manual,
}

/// A single (source, target) pair in the many-to-many crosswalk.
///
/// Fan-out (one source, many targets) and fan-in (many sources, one target)
/// are both expected and must be preserved end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosswalkEdge {
    pub source: SourceCode,
    pub target: TargetCode,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Independent, authoritative population mass for one target code in one
/// period (e.g. enrollment counts). Only the designated base period is used
/// for weight derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub target: TargetCode,
    pub period: u16,
    pub mass: f64,
}

/// One respondent: a source code, a raw sampling weight, and the score to
/// aggregate. A missing score is represented as `f64::NAN`, never imputed.
#[derive(Debug, Clone)]
pub struct WeightedRecord {
    pub source: SourceCode,
    pub weight: f64,
    pub score: f64,
}

impl WeightedRecord {
    pub fn score_is_missing(&self) -> bool {
        self.score.is_nan()
    }
}

/// A crosswalk edge carrying its empirical split weight: the estimated
/// probability that a respondent under `source` truly belongs to `target`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbabilisticEdge {
    pub source: SourceCode,
    pub target: TargetCode,
    pub provenance: Provenance,
    /// In `[0, 1]`; sums to 1.0 over the edges sharing `source`.
    pub split_weight: f64,
}

/// One (respondent, target) pair after expansion.
///
/// `weight` is the respondent's raw weight times the edge's split weight,
/// so the sum over a respondent's expanded records equals the raw weight.
#[derive(Debug, Clone)]
pub struct ExpandedRecord {
    pub target: TargetCode,
    pub weight: f64,
    pub score: f64,
}

/// Why a group's weighted mean is NaN. Both outcomes are legitimate and
/// distinguishable; neither is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NanReason {
    ZeroTotalWeight,
    AllScoresMissing,
}

impl NanReason {
    pub fn display_name(self) -> &'static str {
        match self {
            NanReason::ZeroTotalWeight => "zero or near-zero total weight",
            NanReason::AllScoresMissing => "no non-missing score values",
        }
    }
}

/// Per-target aggregation output. Purely derived; recomputed per run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub target: TargetCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Weighted mean of the score, or NaN (see `nan_reason`).
    pub mean_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nan_reason: Option<NanReason>,
    /// Total contributed weight of the group, including records whose score
    /// is missing.
    pub total_weight: f64,
    pub record_count: usize,
}

/// Floor below which a group's total weight is treated as zero.
///
/// Well above floating noise, far below any realistic single-record weight.
pub const WEIGHT_EPSILON: f64 = 1e-10;

/// Tolerance for the two fatal invariants: split-weight normalization and
/// per-record mass conservation.
pub const INVARIANT_TOL: f64 = 1e-9;
