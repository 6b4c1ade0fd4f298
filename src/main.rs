use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use survey_merge::logging::init_logging;
use survey_merge::{
    load_csv_table, write_csv, write_report, write_sqlite, ModuleInputs, Pipeline,
    PipelineConfig, Validator,
};

/// Exit code when the run completed but the benchmarks did not match
const EXIT_VALIDATION_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "survey-merge")]
#[command(about = "Merge quarterly labour-force survey modules and validate against published figures")]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack, join, reconcile, check and validate the sixteen input files
    Run {
        /// Directory holding the quarterly CSV partitions
        #[arg(long)]
        data_dir: PathBuf,

        /// JSON configuration (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where the master table and report are written
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
        format: OutputFormat,

        /// Override the dataset year used to pick benchmarks
        #[arg(long)]
        year: Option<u32>,
    },
    /// Run only the benchmark validation on an existing master CSV
    Validate {
        #[arg(long)]
        master: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        year: Option<u32>,
    },
    /// Print the built-in default configuration as JSON
    Config,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Sqlite,
    Both,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let passed = match cli.command {
        Commands::Run {
            data_dir,
            config,
            out_dir,
            format,
            year,
        } => run_merge(&data_dir, config.as_deref(), &out_dir, format, year)?,
        Commands::Validate {
            master,
            config,
            year,
        } => run_validate(&master, config.as_deref(), year)?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
            true
        }
    };

    if !passed {
        std::process::exit(EXIT_VALIDATION_FAILED);
    }
    Ok(())
}

fn load_config(path: Option<&Path>, year: Option<u32>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(year) = year {
        config.validation.dataset_year = year;
    }
    config.validate()?;
    Ok(config)
}

fn run_merge(
    data_dir: &Path,
    config: Option<&Path>,
    out_dir: &Path,
    format: OutputFormat,
    year: Option<u32>,
) -> Result<bool> {
    let config = load_config(config, year)?;

    info!(data_dir = %data_dir.display(), "loading partitions");
    let inputs = ModuleInputs::from_dir(data_dir, &config)
        .with_context(|| format!("Failed to load input files from {}", data_dir.display()))?;

    let pipeline = Pipeline::new(config)?;
    let output = pipeline.run(inputs)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    if matches!(format, OutputFormat::Csv | OutputFormat::Both) {
        write_csv(&output.master, &out_dir.join("master.csv"))?;
    }
    if matches!(format, OutputFormat::Sqlite | OutputFormat::Both) {
        write_sqlite(&output.master, &out_dir.join("master.db"), "master")?;
    }
    write_report(&output.summary, &out_dir.join("validation_report.json"))?;

    println!("{}", output.summary.summary());
    Ok(output.summary.overall_pass)
}

fn run_validate(master: &Path, config: Option<&Path>, year: Option<u32>) -> Result<bool> {
    let config = load_config(config, year)?;
    let table = load_csv_table(master, "master")
        .with_context(|| format!("Failed to read master table {}", master.display()))?;

    let report = Validator::new(&config.validation)?.validate(&table);
    println!("{}", report.summary());
    Ok(report.overall_pass)
}
