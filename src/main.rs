use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use refscope::analysis::{CycleDetector, ImpactAnalyzer, OrphanDetector};
use refscope::graph::{GraphBuilder, ObjectKey, ObjectType, RelationshipGraph};
use refscope::report::{Direction, ReportFormat, Reporter};
use refscope::{AnalysisError, BuildWarning, Config, JsonSnapshot, RecordSource};

/// refscope - Find unused objects and deletion impact in device-management exports
#[derive(Parser, Debug)]
#[command(name = "refscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the exported snapshot (JSON)
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal", global = true)]
    format: OutputFormat,

    /// Output file (for json format)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Extract references on a single thread
    #[arg(long, global = true)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List objects nothing references
    Orphans {
        /// Only report these types (can be specified multiple times)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<ObjectType>,

        /// Skip objects created less than this many days ago
        #[arg(long, value_name = "DAYS")]
        min_age_days: Option<u32>,

        /// Name patterns never reported (can be specified multiple times)
        #[arg(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Measure ages at this instant instead of now (RFC 3339)
        #[arg(long, value_name = "TIMESTAMP")]
        as_of: Option<DateTime<Utc>>,
    },

    /// Show what depends on objects before deleting them
    Impact {
        /// Objects to assess, as TYPE:ID
        #[arg(required = true, value_name = "TYPE:ID")]
        targets: Vec<ObjectKey>,
    },

    /// List what an object references
    Uses {
        #[arg(value_name = "TYPE:ID")]
        target: ObjectKey,
    },

    /// List what references an object
    UsedBy {
        #[arg(value_name = "TYPE:ID")]
        target: ObjectKey,
    },

    /// Find reference cycles
    Cycles,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    info!("refscope v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&cli)?;

    run_analysis(&config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // stdout carries the report
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from next to the snapshot
        let dir = cli
            .snapshot
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Config::from_default_locations(&dir)?
    };

    // Override with CLI arguments
    if cli.sequential {
        config.build.parallel = false;
    }
    if let Command::Orphans {
        min_age_days,
        exclude,
        ..
    } = &cli.command
    {
        if let Some(days) = min_age_days {
            config.orphans.min_age_days = *days;
        }
        config.orphans.exclude_name_patterns.extend(exclude.iter().cloned());
    }

    Ok(config)
}

fn run_analysis(config: &Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load the snapshot
    let ingested = JsonSnapshot::from_path(&cli.snapshot).load()?;

    // Step 2: Build the graph
    let rule_set = config
        .rule_set()
        .into_diagnostic()
        .wrap_err("Invalid extraction rules")?;
    let graph = GraphBuilder::new(&rule_set)
        .with_parallel(config.build.parallel)
        .build(ingested.records);

    let mut warnings: Vec<BuildWarning> = ingested
        .rejected
        .into_iter()
        .map(BuildWarning::PartialRecord)
        .collect();
    warnings.extend(graph.warnings().iter().cloned());

    // Step 3: Answer the question
    let reporter =
        Reporter::new(cli.format.clone().into(), cli.output.clone()).with_warnings(!cli.quiet);

    match &cli.command {
        Command::Orphans { types, as_of, .. } => {
            let mut options = config.scan_options(as_of.unwrap_or_else(Utc::now));
            options.type_filter = types.clone();

            let orphans = OrphanDetector::new()
                .scan(&graph, &options)
                .into_diagnostic()?;
            info!("Found {} orphaned objects", orphans.len());

            reporter.report_orphans(&orphans, &warnings)?;
        }
        Command::Impact { targets } => {
            config
                .risk
                .validate()
                .into_diagnostic()
                .wrap_err("Invalid risk thresholds")?;

            let results = ImpactAnalyzer::new(config.risk).assess_batch(&graph, targets);
            reporter.report_impacts(&results, &warnings)?;

            let failed = results.values().filter(|r| r.is_err()).count();
            if failed > 0 {
                return Err(miette!(
                    "{} of {} targets could not be assessed",
                    failed,
                    results.len()
                ));
            }
        }
        Command::Uses { target } => {
            require(&graph, target)?;
            reporter.report_edges(&graph, target, Direction::Uses, &warnings)?;
        }
        Command::UsedBy { target } => {
            require(&graph, target)?;
            reporter.report_edges(&graph, target, Direction::UsedBy, &warnings)?;
        }
        Command::Cycles => {
            let cycles = CycleDetector::new().find_cycles(&graph);
            info!("Found {} reference cycles", cycles.len());
            reporter.report_cycles(&cycles, &warnings)?;
        }
    }

    info!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn require(graph: &RelationshipGraph, key: &ObjectKey) -> Result<()> {
    if graph.contains(key) {
        Ok(())
    } else {
        Err(AnalysisError::NotFound(key.clone())).into_diagnostic()
    }
}
