//! Synthetic dataset generation for the `demo` subcommand.
//!
//! Produces a coherent crosswalk + totals + records triple that exercises
//! every diagnostic path deterministically:
//!
//! - realistic fan-out (3–16 targets per source) with shared targets (fan-in)
//! - log-normal base-period masses, a slice of them exactly zero
//! - targets with mass but no incoming edge (unmapped-target report)
//! - records under sources absent from the crosswalk (unmapped-source report)
//! - sentinel "no field reported" records
//! - a configurable missing-score fraction

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal};

use crate::domain::{
    CategoryTotal, CrosswalkEdge, Provenance, SourceCode, TargetCode, WeightedRecord,
};
use crate::error::AppError;

/// Fraction of targets whose base-period mass is exactly zero.
const ZERO_MASS_RATE: f64 = 0.04;

/// Fraction of records carrying the sentinel source code.
const SENTINEL_RATE: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub seed: u64,
    pub source_count: usize,
    pub record_count: usize,
    /// Fraction of records with a missing score.
    pub missing_score_rate: f64,
    /// Fraction of records whose source is absent from the crosswalk.
    pub unmapped_rate: f64,
    pub base_period: u16,
    pub sentinel: u32,
}

#[derive(Debug, Clone)]
pub struct SampleData {
    pub edges: Vec<CrosswalkEdge>,
    pub titles: std::collections::HashMap<TargetCode, String>,
    pub totals: Vec<CategoryTotal>,
    pub records: Vec<WeightedRecord>,
}

pub fn generate_sample(config: &SampleConfig) -> Result<SampleData, AppError> {
    if config.source_count == 0 {
        return Err(AppError::input("Sample source count must be > 0."));
    }
    if config.record_count == 0 {
        return Err(AppError::input("Sample record count must be > 0."));
    }
    for (name, rate) in [
        ("missing-score rate", config.missing_score_rate),
        ("unmapped rate", config.unmapped_rate),
    ] {
        if !(0.0..1.0).contains(&rate) {
            return Err(AppError::input(format!(
                "Sample {name} must be in [0, 1), got {rate}."
            )));
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);

    let mass_dist: LogNormal<f64> = LogNormal::new(7.0, 1.4)
        .map_err(|e| AppError::input(format!("Mass distribution error: {e}")))?;
    let weight_dist = LogNormal::new(4.0, 0.8)
        .map_err(|e| AppError::input(format!("Weight distribution error: {e}")))?;
    let score_dist = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::input(format!("Score distribution error: {e}")))?;

    // Target pool roughly 4x the source count: enough room for fan-in plus
    // a tail of targets no source reaches.
    let target_pool: Vec<TargetCode> = (0..config.source_count * 4)
        .map(|i| TargetCode(1000 + i as u32))
        .collect();

    let sources: Vec<SourceCode> = (0..config.source_count)
        .map(|i| SourceCode(100 + i as u32))
        .collect();

    let mut edges = Vec::new();
    let mut titles = std::collections::HashMap::new();
    for &source in &sources {
        let fan_out = rng.gen_range(3..=16usize);
        let mut picked: Vec<TargetCode> = Vec::with_capacity(fan_out);
        while picked.len() < fan_out {
            let target = target_pool[rng.gen_range(0..target_pool.len())];
            if !picked.contains(&target) {
                picked.push(target);
            }
        }
        for target in picked {
            titles
                .entry(target)
                .or_insert_with(|| format!("Program {}", target.0));
            edges.push(CrosswalkEdge {
                source,
                target,
                provenance: Provenance::FromTable,
                note: None,
            });
        }
    }

    let mut totals = Vec::with_capacity(target_pool.len());
    for &target in &target_pool {
        let mass = if rng.gen_bool(ZERO_MASS_RATE) {
            0.0
        } else {
            mass_dist.sample(&mut rng).round()
        };
        totals.push(CategoryTotal {
            target,
            period: config.base_period,
            mass,
        });
    }

    let mut records = Vec::with_capacity(config.record_count);
    for _ in 0..config.record_count {
        let source = if rng.gen_bool(SENTINEL_RATE) {
            SourceCode(config.sentinel)
        } else if rng.gen_bool(config.unmapped_rate) {
            // Codes above the crosswalk range: never mapped.
            SourceCode(10_000 + rng.gen_range(0..50u32))
        } else {
            sources[rng.gen_range(0..sources.len())]
        };
        let weight = weight_dist.sample(&mut rng);
        let score = if rng.gen_bool(config.missing_score_rate) {
            f64::NAN
        } else {
            score_dist.sample(&mut rng)
        };
        records.push(WeightedRecord {
            source,
            weight,
            score,
        });
    }

    Ok(SampleData {
        edges,
        titles,
        totals,
        records,
    })
}
