//! Batch driver for the MGCI reporting core.
//!
//! `plan` prints the aggregations the engine must compute for a run file;
//! `report` reads the engine's `<label>.json` results back and writes the
//! SDG 15.4.2 workbook.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mgci_core::{
    build_reports, export::export, plan_calculation, AggregationResult, AoiMethod, AreaUnit, CalculationPlan,
    GeoArea, ReferenceConfig, ReportContext, ResultSet, SubBSelection, YearSpec,
};
use rayon::prelude::*;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mgci-report", about = "Plan and report SDG 15.4.2 Mountain Green Cover Index runs")]
struct Args {
    /// Directory with reference CSV tables overriding the built-in ones.
    #[arg(short = 'r', long, global = true)]
    reference_dir: Option<PathBuf>,

    /// Reporting periods to use instead of the reference table (e.g. 2000,2015,2018).
    #[arg(long, global = true, value_delimiter = ',')]
    periods: Option<Vec<i32>>,

    /// Log filter when MGCI_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the engine requests for a run as JSON.
    Plan {
        /// Run description (AOI, sub-A years, sub-B selection).
        run: PathBuf,

        /// Write the requests here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the report workbook from engine results.
    Report {
        run: PathBuf,

        /// Directory holding one `<label>.json` per engine request.
        #[arg(short = 'i', long)]
        results_dir: PathBuf,

        #[arg(short, long, default_value = "mgci_report.xlsx")]
        output: PathBuf,

        /// Area unit for OBS_VALUE: `ha` or `sqkm`.
        #[arg(short, long, default_value = "sqkm", value_parser = parse_unit)]
        units: AreaUnit,
    },
}

fn parse_unit(s: &str) -> std::result::Result<AreaUnit, String> {
    s.parse().map_err(|e: mgci_core::Error| e.to_string())
}

// ── Run file ──────────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct Aoi {
    method: AoiMethod,
    name: String,
}

#[derive(Deserialize, Debug)]
struct RunFile {
    aoi: Aoi,
    #[serde(default)]
    sub_a: Option<Vec<YearSpec>>,
    #[serde(default)]
    sub_b: Option<SubBSelection>,
}

fn read_run(path: &Path) -> Result<RunFile> {
    let text = fs::read_to_string(path).with_context(|| format!("reading run file {}", path.display()))?;
    let run: RunFile =
        serde_json::from_str(&text).with_context(|| format!("parsing run file {}", path.display()))?;
    if run.sub_a.is_none() && run.sub_b.is_none() {
        bail!("run file {} selects neither sub-A years nor a sub-B baseline", path.display());
    }
    Ok(run)
}

fn load_config(args: &Args) -> Result<ReferenceConfig> {
    let config = match &args.reference_dir {
        Some(dir) => ReferenceConfig::from_dir(dir)
            .with_context(|| format!("loading reference tables from {}", dir.display()))?,
        None => ReferenceConfig::builtin().context("loading built-in reference tables")?,
    };
    Ok(match &args.periods {
        Some(periods) => config.with_reporting_periods(periods.iter().copied()),
        None => config,
    })
}

fn plan_run(config: &ReferenceConfig, run: &RunFile) -> Result<CalculationPlan> {
    plan_calculation(config, run.sub_a.as_deref(), run.sub_b.as_ref()).context("planning calculation")
}

// ── Result loading ────────────────────────────────────────────────────────────

fn load_result(dir: &Path, label: &str) -> Result<AggregationResult> {
    let path = dir.join(format!("{label}.json"));
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    AggregationResult::from_json(label, &text).with_context(|| format!("parsing {}", path.display()))
}

fn load_results(dir: &Path, plan: &CalculationPlan) -> ResultSet {
    let loaded: Vec<Result<AggregationResult>> =
        plan.requests.par_iter().map(|req| load_result(dir, &req.label)).collect();

    let mut results = ResultSet::new();
    let mut warn_count = 0usize;
    for res in loaded {
        match res {
            Ok(result) => results.insert(result),
            Err(e) => {
                eprintln!("Warning: {e:#}");
                warn_count += 1;
            }
        }
    }
    if warn_count > 0 {
        eprintln!("{warn_count} results missing or unreadable.");
    }
    results
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn init_tracing(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MGCI_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log)?;
    let config = load_config(&args)?;

    match &args.command {
        Command::Plan { run, output } => {
            let run = read_run(run)?;
            let plan = plan_run(&config, &run)?;
            let json = serde_json::to_string_pretty(&plan.requests)?;
            match output {
                Some(path) => {
                    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("{} engine requests written to {}", plan.requests.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Report { run, results_dir, output, units } => {
            let run = read_run(run)?;
            let plan = plan_run(&config, &run)?;
            let geo_area = GeoArea::resolve(&config, run.aoi.method, &run.aoi.name)
                .with_context(|| format!("resolving area '{}'", run.aoi.name))?;

            eprintln!("Loading {} engine results from {} ...", plan.requests.len(), results_dir.display());
            let results = load_results(results_dir, &plan);
            tracing::info!(loaded = results.len(), planned = plan.requests.len(), "engine results loaded");

            let ctx = ReportContext { geo_area, unit: *units };
            let tables = build_reports(&config, &ctx, &results, &plan).context("building report tables")?;
            export(&tables, output)?;

            eprintln!("\n{:<24} {:>6}", "Sheet", "Rows");
            eprintln!("{}", "-".repeat(31));
            for table in &tables {
                eprintln!("{:<24} {:>6}", table.name, table.rows.len());
            }
            eprintln!("\nWrote {} ({})", output.display(), units.name());
        }
    }
    Ok(())
}
