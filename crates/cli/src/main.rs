//! landshift CLI - land-cover change detection from Sentinel-2 composites

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use landshift_core::io::read_geotiff_bands;
use landshift_pipeline::{ChangeMethod, Pipeline, PipelineConfig, StageReport};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landshift")]
#[command(author, version, about = "Land-cover change detection from Sentinel-2 composites", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for per-year work (1 = sequential, 0 = all cores)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute NDVI, NDBI, NDWI and BSI rasters from reflectance composites
    Indices {
        /// Years to process; every year with a composite when omitted
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,
    },
    /// Detect changes between two years
    Detect {
        #[command(flatten)]
        pair: YearPair,
        /// difference, urban-classification, anomaly or all
        #[arg(short, long, default_value = "all")]
        method: String,
    },
    /// Aggregate change rasters by zone
    Zonal {
        #[command(flatten)]
        pair: YearPair,
        /// Change raster(s) to aggregate: difference, urban-classification, anomaly or all
        #[arg(short, long, default_value = "urban-classification")]
        method: String,
        /// Also aggregate the anomaly z-scores of the target year
        #[arg(long)]
        anomaly: bool,
    },
    /// Run indices, detection and zonal aggregation in sequence
    Run {
        #[command(flatten)]
        pair: YearPair,
        #[arg(short, long, default_value = "all")]
        method: String,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(clap::Args)]
struct YearPair {
    /// Base year; the first configured year when omitted
    #[arg(long)]
    t1: Option<i32>,
    /// Target year; the last configured year when omitted
    #[arg(long)]
    t2: Option<i32>,
}

impl YearPair {
    fn resolve(&self, config: &PipelineConfig) -> Result<(i32, i32)> {
        let t1 = self.t1.unwrap_or(config.years.min);
        let t2 = self.t2.unwrap_or(config.years.max);
        config.years.check_pair(t1, t2)?;
        Ok((t1, t2))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>, jobs: Option<usize>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if jobs.is_some() {
        config.execution.jobs = jobs;
    }
    Ok(config)
}

fn parse_method(s: &str) -> Result<ChangeMethod> {
    s.parse::<ChangeMethod>().context("Invalid --method")
}

/// Print a stage outcome; an error when no unit of the stage succeeded
fn check_report(report: &StageReport) -> Result<()> {
    println!(
        "Stage {}: {} completed, {} failed",
        report.stage,
        report.completed.len(),
        report.failed.len()
    );
    for (unit, err) in &report.failed {
        eprintln!("  {} failed: {}", unit, err);
    }
    if report.all_failed() {
        bail!("every unit of stage '{}' failed", report.stage);
    }
    Ok(())
}

fn run_stage<F>(msg: &str, f: F) -> Result<StageReport>
where
    F: FnOnce() -> landshift_pipeline::Result<StageReport>,
{
    let pb = spinner(msg);
    let start = Instant::now();
    let report = f();
    pb.finish_and_clear();
    let report = report.with_context(|| format!("{} aborted", msg.trim_end_matches('.')))?;
    info!("{} done in {:.2?}", report.stage, start.elapsed());
    Ok(report)
}

fn print_info(input: &Path) -> Result<()> {
    let pb = spinner("Reading raster...");
    let stack = read_geotiff_bands(input).context("Failed to read raster");
    pb.finish_and_clear();
    let stack = stack?;

    let template = stack.template();
    let (rows, cols) = stack.shape();
    let bounds = template.bounds();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, template.len());
    println!("Bands: {}", stack.num_bands());
    println!("Cell size: {}", template.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    match stack.crs() {
        Some(crs) => println!("CRS: {}", crs.identifier()),
        None => println!("CRS: unknown"),
    }

    for (name, band) in stack.names().iter().zip(stack.bands()) {
        let stats = band.statistics();
        println!("\nBand {}:", name);
        if let (Some(min), Some(max)) = (stats.min, stats.max) {
            println!("  Range: {:.4} .. {:.4}", min, max);
        }
        if let Some(mean) = stats.mean {
            println!("  Mean: {:.4}", mean);
        }
        if let Some(std) = stats.std_dev {
            println!("  Std dev: {:.4}", std);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / band.len() as f64
        );
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let load = || -> Result<Pipeline> { Ok(Pipeline::new(load_config(cli.config.as_deref(), cli.jobs)?)) };

    match &cli.command {
        Commands::Info { input } => print_info(input)?,

        Commands::Indices { years } => {
            let pipeline = load()?;
            for &year in years {
                pipeline.config().years.check_year(year)?;
            }
            let report = run_stage("Computing indices...", || pipeline.indices(years))?;
            check_report(&report)?;
        }

        Commands::Detect { pair, method } => {
            let pipeline = load()?;
            let method = parse_method(method)?;
            let (t1, t2) = pair.resolve(pipeline.config())?;
            let report = run_stage("Detecting changes...", || pipeline.detect(t1, t2, method))?;
            check_report(&report)?;
        }

        Commands::Zonal {
            pair,
            method,
            anomaly,
        } => {
            let pipeline = load()?;
            let mut methods = parse_method(method)?.expand();
            if *anomaly && !methods.contains(&ChangeMethod::Anomaly) {
                methods.push(ChangeMethod::Anomaly);
            }
            let (t1, t2) = pair.resolve(pipeline.config())?;
            let report = run_stage("Aggregating by zone...", || pipeline.zonal(t1, t2, &methods))?;
            check_report(&report)?;
        }

        Commands::Run { pair, method } => {
            let pipeline = load()?;
            let method = parse_method(method)?;
            let (t1, t2) = pair.resolve(pipeline.config())?;
            let start = Instant::now();
            let reports = pipeline
                .run(t1, t2, method)
                .with_context(|| format!("Pipeline run {} -> {} aborted", t1, t2))?;
            for report in &reports {
                check_report(report)?;
            }
            println!("Pipeline {} -> {} finished in {:.2?}", t1, t2, start.elapsed());
        }
    }

    Ok(())
}
