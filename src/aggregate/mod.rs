//! Zero/NaN-safe weighted aggregation.
//!
//! Groups expanded records by target code and computes the weighted mean of
//! the score. Two degenerate group shapes get an explicit NaN-with-reason
//! instead of an error:
//!
//! - total contributed weight below `WEIGHT_EPSILON` (the group cannot be
//!   averaged at all)
//! - positive weight but every score missing (the group has mass and no
//!   usable observations)
//!
//! Missing values are never replaced with a global or cross-group mean:
//! an unbiased-but-smaller result set beats a biased-but-complete one.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::domain::{
    AggregateResult, ExpandedRecord, NanReason, TargetCode, WEIGHT_EPSILON,
};

#[derive(Debug, Default)]
struct GroupAccumulator {
    /// Σ weight over all usable-weight records, missing scores included.
    total_weight: f64,
    /// Σ weight restricted to records with a non-missing score.
    valid_weight: f64,
    /// Σ weight × score over the same restriction.
    weighted_score: f64,
    record_count: usize,
}

/// Group by target and compute per-group weighted means.
///
/// Iteration is in target-code order, so within-group summation order is
/// fixed and results are reproducible across runs. Records whose
/// contributed weight is NaN count as zero weight and are excluded from
/// the numerator as well.
pub fn aggregate_by_target(
    expanded: &[ExpandedRecord],
    titles: &HashMap<TargetCode, String>,
) -> Vec<AggregateResult> {
    let mut groups: BTreeMap<TargetCode, GroupAccumulator> = BTreeMap::new();

    for record in expanded {
        let acc = groups.entry(record.target).or_default();
        if record.weight.is_nan() {
            continue;
        }
        acc.total_weight += record.weight;
        acc.record_count += 1;
        if !record.score.is_nan() {
            acc.valid_weight += record.weight;
            acc.weighted_score += record.weight * record.score;
        }
    }

    let mut results = Vec::with_capacity(groups.len());
    for (target, acc) in groups {
        let (mean_score, nan_reason) = if acc.total_weight < WEIGHT_EPSILON {
            warn!(
                target_code = target.0,
                total_weight = acc.total_weight,
                "target group has zero or near-zero total weight; mean is NaN"
            );
            (f64::NAN, Some(NanReason::ZeroTotalWeight))
        } else if acc.valid_weight < WEIGHT_EPSILON {
            warn!(
                target_code = target.0,
                total_weight = acc.total_weight,
                "target group has no non-missing score values; mean is NaN"
            );
            (f64::NAN, Some(NanReason::AllScoresMissing))
        } else {
            (acc.weighted_score / acc.valid_weight, None)
        };

        results.push(AggregateResult {
            target,
            title: titles.get(&target).cloned(),
            mean_score,
            nan_reason,
            total_weight: acc.total_weight,
            record_count: acc.record_count,
        });
    }

    results
}
