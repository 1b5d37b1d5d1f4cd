//! Formatted terminal output: run summary, aggregate table, coverage reports.
//!
//! We keep formatting code in one place so:
//! - the crosswalk/aggregation code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::RunOutput;
use crate::diagnostics::CoverageReport;
use crate::domain::AggregateResult;

/// Format the run header: input sizes and derivation outcome.
pub fn format_run_summary(output: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== xwalk - weighted crosswalk aggregation ===\n");
    out.push_str(&format!("Base period: {}\n", output.base_period));
    out.push_str(&format!(
        "Crosswalk: {} edges ({} duplicates collapsed) over {} sources\n",
        output.stats.edge_count,
        output.stats.duplicate_edge_count,
        output.stats.source_count,
    ));
    out.push_str(&format!(
        "Totals: {} targets in base period\n",
        output.stats.base_target_count
    ));
    out.push_str(&format!(
        "Mapping: {} sources weighted | {} unweighable | {} edges dropped\n",
        output.mapping.source_count(),
        output.coverage.unweighable_sources.len(),
        output.coverage.dropped_edges.len(),
    ));
    out.push_str(&format!(
        "Records: n={} | weight={:.0} | mapped weight={:.0} ({:.1}%)\n",
        output.stats.record_count,
        output.expansion.input_weight,
        output.expansion.mapped_weight,
        percent(output.expansion.mapped_weight, output.expansion.input_weight),
    ));
    out.push_str(&format!(
        "Expanded: {} rows across {} targets\n",
        output.expansion.records.len(),
        output.results.len(),
    ));

    out
}

/// Format the aggregate table, highest means first, NaN groups last with
/// their reasons spelled out.
pub fn format_aggregate_table(results: &[AggregateResult], top_n: usize) -> String {
    let mut out = String::new();

    let mut valid: Vec<&AggregateResult> = results.iter().filter(|r| !r.mean_score.is_nan()).collect();
    valid.sort_by(|a, b| {
        b.mean_score
            .partial_cmp(&a.mean_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    out.push_str(&format!("Top {} targets by weighted mean score:\n", top_n));
    out.push_str(&format!(
        "{:<8} {:<32} {:>12} {:>14} {:>8}\n",
        "target", "title", "mean", "total_weight", "n"
    ));
    for r in valid.iter().take(top_n) {
        out.push_str(&format!(
            "{:<8} {:<32} {:>12.4} {:>14.1} {:>8}\n",
            r.target.to_string(),
            truncate(r.title.as_deref().unwrap_or(""), 32),
            r.mean_score,
            r.total_weight,
            r.record_count,
        ));
    }

    let degenerate: Vec<&AggregateResult> =
        results.iter().filter(|r| r.mean_score.is_nan()).collect();
    if !degenerate.is_empty() {
        out.push_str(&format!("\nTargets without a mean ({}):\n", degenerate.len()));
        for r in degenerate.iter().take(top_n) {
            out.push_str(&format!(
                "  {:<8} {} (total_weight={:.3})\n",
                r.target.to_string(),
                r.nan_reason.map(|n| n.display_name()).unwrap_or("?"),
                r.total_weight,
            ));
        }
    }

    out
}

/// Format the three coverage reports as aligned text tables.
pub fn format_coverage(coverage: &CoverageReport, top_n: usize) -> String {
    let mut out = String::new();

    out.push_str("(a) Source codes in records but not in the mapping:\n");
    if coverage.unmapped_sources.is_empty() {
        out.push_str("  none\n");
    } else {
        out.push_str(&format!(
            "  {} sources | lost weight {:.0} / {:.0} ({:.1}%)\n",
            coverage.unmapped_sources.len(),
            coverage.unmapped_record_weight,
            coverage.total_record_weight,
            percent(coverage.unmapped_record_weight, coverage.total_record_weight),
        ));
        out.push_str(&format!(
            "  {:<8} {:>14} {:>8}\n",
            "source", "weight", "records"
        ));
        for u in coverage.unmapped_sources.iter().take(top_n) {
            out.push_str(&format!(
                "  {:<8} {:>14.1} {:>8}\n",
                u.source.to_string(),
                u.total_weight,
                u.record_count
            ));
        }
    }

    out.push_str("\n(b) Targets with base-period mass but no incoming mapping:\n");
    if coverage.unmapped_targets.is_empty() {
        out.push_str("  none\n");
    } else {
        out.push_str(&format!(
            "  {:<8} {:<32} {:>14}\n",
            "target", "title", "base_mass"
        ));
        for t in coverage.unmapped_targets.iter().take(top_n) {
            out.push_str(&format!(
                "  {:<8} {:<32} {:>14.0}\n",
                t.target.to_string(),
                truncate(t.title.as_deref().unwrap_or(""), 32),
                t.base_mass,
            ));
        }
    }

    out.push_str("\n(c) Curation candidates (unmapped sources by weight share):\n");
    if coverage.curation_candidates.is_empty() {
        out.push_str("  none\n");
    } else {
        out.push_str(&format!(
            "  {:<8} {:>14} {:>8} {:>8}\n",
            "source", "weight", "records", "share"
        ));
        for c in &coverage.curation_candidates {
            out.push_str(&format!(
                "  {:<8} {:>14.1} {:>8} {:>7.2}%\n",
                c.source.to_string(),
                c.total_weight,
                c.record_count,
                c.weight_share * 100.0,
            ));
        }
    }

    if !coverage.unweighable_sources.is_empty() {
        out.push_str(&format!(
            "\nUnweighable sources (no base-period mass on any target): {}\n",
            coverage.unweighable_sources.len()
        ));
        for u in coverage.unweighable_sources.iter().take(top_n) {
            out.push_str(&format!(
                "  {:<8} ({} crosswalk edges)\n",
                u.source.to_string(),
                u.edge_count
            ));
        }
    }

    out
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NanReason, TargetCode};

    fn result(target: u32, mean: f64, reason: Option<NanReason>) -> AggregateResult {
        AggregateResult {
            target: TargetCode(target),
            title: Some(format!("Program {target}")),
            mean_score: mean,
            nan_reason: reason,
            total_weight: 100.0,
            record_count: 5,
        }
    }

    #[test]
    fn aggregate_table_sorts_and_separates_nan_groups() {
        let results = vec![
            result(1, 0.2, None),
            result(2, 0.9, None),
            result(3, f64::NAN, Some(NanReason::AllScoresMissing)),
        ];
        let text = format_aggregate_table(&results, 10);

        let pos_2 = text.find("Program 2").unwrap();
        let pos_1 = text.find("Program 1").unwrap();
        assert!(pos_2 < pos_1, "higher mean should print first");
        assert!(text.contains("no non-missing score values"));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        let long = "Business Administration and Management";
        assert_eq!(truncate(long, 10).chars().count(), 10);
    }
}
