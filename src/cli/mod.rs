//! Command-line parsing for the crosswalk aggregation tool.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the crosswalk/aggregation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "xwalk",
    version,
    about = "Weighted many-to-many crosswalk resolution and aggregation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline from CSV inputs and print results + coverage.
    Run(RunArgs),
    /// Coverage diagnostics only (no aggregate table, no results export).
    ///
    /// Useful for prioritizing manual crosswalk curation before a full run.
    Coverage(RunArgs),
    /// Run the pipeline on a seeded synthetic dataset.
    Demo(DemoArgs),
}

/// Common options for `run` and `coverage`.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Crosswalk CSV (`source,target[,title][,provenance][,note]`).
    #[arg(long)]
    pub crosswalk: PathBuf,

    /// Category totals CSV (`target,period,mass[,title]`).
    #[arg(long)]
    pub totals: PathBuf,

    /// Weighted records CSV (`source,weight[,score]`).
    #[arg(long)]
    pub records: PathBuf,

    /// Optional manually curated crosswalk CSV; rows are merged in with
    /// provenance = manual before weight derivation.
    #[arg(long)]
    pub manual: Option<PathBuf>,

    /// Period whose category totals drive the split weights.
    #[arg(long, default_value_t = 2019)]
    pub base_period: u16,

    /// Source code meaning "no field reported" (filtered at ingest).
    #[arg(long, default_value_t = 0)]
    pub sentinel: u32,

    /// Rows to show in ranked reports.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the aggregate table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the coverage report to JSON.
    #[arg(long = "export-coverage")]
    pub export_coverage: Option<PathBuf>,
}

/// Options for `demo`.
#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of source codes in the synthetic taxonomy.
    #[arg(long, default_value_t = 60)]
    pub sources: usize,

    /// Number of synthetic weighted records.
    #[arg(long, default_value_t = 5000)]
    pub records: usize,

    /// Fraction of records with a missing score.
    #[arg(long, default_value_t = 0.08)]
    pub missing_rate: f64,

    /// Fraction of records under sources absent from the crosswalk.
    #[arg(long, default_value_t = 0.05)]
    pub unmapped_rate: f64,

    /// Base period stamped on the synthetic totals.
    #[arg(long, default_value_t = 2019)]
    pub base_period: u16,

    /// Rows to show in ranked reports.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the aggregate table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the coverage report to JSON.
    #[arg(long = "export-coverage")]
    pub export_coverage: Option<PathBuf>,
}
