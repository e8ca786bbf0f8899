use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod bounds;
mod cache;
mod commentary;
mod config;
mod dashboard;
mod formula;
mod loader;
mod models;
mod report;
mod stats;

use crate::cache::DatasetCache;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "survey-metrics")]
#[command(about = "Category statistics and engagement scores for questionnaire responses", long_about = None)]
struct Cli {
    /// TOML file with survey families, categories and meta formulas
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding one subdirectory of CSV files per survey family
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Directory holding analyst commentary files
    #[arg(long, global = true)]
    analysis_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the report to stdout
    Summary {
        #[arg(long)]
        family: Option<String>,
        #[arg(long, default_value_t = false)]
        show_data: bool,
    },
    /// Write a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write every panel as JSON for the presentation layer
    Export {
        #[arg(long, default_value = "panels.json")]
        out: PathBuf,
    },
    /// List meta formulas with their theoretical ranges
    Bounds,
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.analysis_dir {
        config.analysis_dir = dir;
    }

    match cli.command {
        Commands::Summary { family, show_data } => {
            if let Some(name) = family.as_deref() {
                config
                    .family(name)
                    .with_context(|| format!("unknown survey family `{name}`"))?;
            }
            let dashboard = dashboard::build(&config, &mut DatasetCache::new(&config.data_dir));
            print!("{}", report::build_report(&dashboard, family.as_deref(), show_data));
        }
        Commands::Report { out } => {
            let dashboard = dashboard::build(&config, &mut DatasetCache::new(&config.data_dir));
            let report = report::build_report(&dashboard, None, false);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report: {}", out.display()))?;
            info!(path = %out.display(), "report written");
        }
        Commands::Export { out } => {
            let dashboard = dashboard::build(&config, &mut DatasetCache::new(&config.data_dir));
            let json = report::to_json(&dashboard)?;
            std::fs::write(&out, json + "\n")
                .with_context(|| format!("failed to write panels: {}", out.display()))?;
            info!(path = %out.display(), "panels written");
        }
        Commands::Bounds => {
            print!("{}", report::bounds_listing(&config));
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
