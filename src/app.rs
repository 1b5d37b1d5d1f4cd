//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads (or generates) the three input tables
//! - runs the crosswalk/aggregation pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing::{debug, warn};

use crate::cli::{Cli, Command, DemoArgs, RunArgs};
use crate::data::{generate_sample, SampleConfig};
use crate::domain::Provenance;
use crate::error::AppError;
use crate::io::export::{write_coverage_json, write_results_csv, CoverageFile};
use crate::io::ingest::{load_category_totals, load_crosswalk, load_weighted_records, RowError};

pub mod pipeline;

use pipeline::{run_pipeline, split_sentinel, PipelineInputs, RunOutput};

/// Entry point for the `xwalk` binary.
pub fn run() -> Result<(), AppError> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args, OutputMode::Full),
        Command::Coverage(args) => handle_run(args, OutputMode::CoverageOnly),
        Command::Demo(args) => handle_demo(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    CoverageOnly,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Diagnostics go to stderr so stdout stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_run(args: RunArgs, mode: OutputMode) -> Result<(), AppError> {
    let crosswalk = load_crosswalk(&args.crosswalk)?;
    report_row_errors(&args.crosswalk.display().to_string(), &crosswalk.row_errors);

    // Manual curation is just another source of edges, merged before weight
    // derivation; only the provenance tag differs.
    let manual_edges = match &args.manual {
        Some(path) => {
            let manual = load_crosswalk(path)?;
            report_row_errors(&path.display().to_string(), &manual.row_errors);
            manual
                .edges
                .into_iter()
                .map(|mut edge| {
                    edge.provenance = Provenance::Manual;
                    edge
                })
                .collect()
        }
        None => Vec::new(),
    };

    let totals = load_category_totals(&args.totals)?;
    report_row_errors(&args.totals.display().to_string(), &totals.row_errors);

    let records = load_weighted_records(&args.records, args.sentinel)?;
    report_row_errors(&args.records.display().to_string(), &records.row_errors);

    debug!(
        crosswalk_rows = crosswalk.rows_read,
        totals_rows = totals.rows_read,
        record_rows = records.rows_read,
        "ingest complete"
    );

    // Crosswalk titles win over totals titles where both name a target.
    let mut titles = totals.titles;
    titles.extend(crosswalk.titles);

    let inputs = PipelineInputs {
        edges: crosswalk.edges,
        manual_edges,
        titles,
        totals: totals.totals,
        records: records.records,
    };

    let output = run_pipeline(inputs, args.base_period, args.top)?;

    print_output(
        &output,
        mode,
        args.top,
        records.sentinel_count,
        records.sentinel_weight,
    );

    if mode == OutputMode::Full {
        if let Some(path) = &args.export {
            write_results_csv(path, &output.results)?;
        }
    }
    if let Some(path) = &args.export_coverage {
        write_coverage_json(
            path,
            &CoverageFile {
                tool: "xwalk",
                base_period: args.base_period,
                sentinel_count: records.sentinel_count,
                sentinel_weight: records.sentinel_weight,
                report: &output.coverage,
            },
        )?;
    }

    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let sample = generate_sample(&SampleConfig {
        seed: args.seed,
        source_count: args.sources,
        record_count: args.records,
        missing_score_rate: args.missing_rate,
        unmapped_rate: args.unmapped_rate,
        base_period: args.base_period,
        sentinel: 0,
    })?;

    let (records, sentinel_count, sentinel_weight) = split_sentinel(sample.records, 0);

    let inputs = PipelineInputs {
        edges: sample.edges,
        manual_edges: Vec::new(),
        titles: sample.titles,
        totals: sample.totals,
        records,
    };

    let output = run_pipeline(inputs, args.base_period, args.top)?;

    print_output(&output, OutputMode::Full, args.top, sentinel_count, sentinel_weight);

    if let Some(path) = &args.export {
        write_results_csv(path, &output.results)?;
    }
    if let Some(path) = &args.export_coverage {
        write_coverage_json(
            path,
            &CoverageFile {
                tool: "xwalk",
                base_period: args.base_period,
                sentinel_count,
                sentinel_weight,
                report: &output.coverage,
            },
        )?;
    }

    Ok(())
}

fn print_output(
    output: &RunOutput,
    mode: OutputMode,
    top_n: usize,
    sentinel_count: usize,
    sentinel_weight: f64,
) {
    println!("{}", crate::report::format_run_summary(output));
    if sentinel_count > 0 {
        println!(
            "Sentinel rows filtered: {sentinel_count} (weight {sentinel_weight:.0})\n"
        );
    }

    if mode == OutputMode::Full {
        println!("{}", crate::report::format_aggregate_table(&output.results, top_n));
    }

    println!("{}", crate::report::format_coverage(&output.coverage, top_n));
}

fn report_row_errors(file: &str, row_errors: &[RowError]) {
    if row_errors.is_empty() {
        return;
    }
    warn!(
        file,
        skipped = row_errors.len(),
        "skipped malformed rows during ingest"
    );
    for err in row_errors.iter().take(5) {
        warn!(file, line = err.line, "{}", err.message);
    }
}
