//! Command-line entry point for gossip-eval.
//!
//! `analyze` derives the time series of one experiment, `plan` resolves job
//! plans, `topology` builds a single overlay graph.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use env_logger::Env;
use log::info;

use gossip_eval::analysis;
use gossip_eval::config::{AnalysisConfig, Protocol};
use gossip_eval::config_loader::{self, CliOverrides};
use gossip_eval::plan;
use gossip_eval::topology::Graph;

/// Overlay generation and time-series analysis for gossip aggregation experiments
#[derive(Parser, Debug)]
#[command(name = "gossip-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive averaged, event-aware series from an experiment's raw samples
    Analyze {
        /// Analysis configuration YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Experiment name, used without a configuration file
        #[arg(long, conflicts_with = "config", required_unless_present = "config")]
        experiment: Option<String>,

        /// Directory holding the run directories, used without a configuration file
        #[arg(long, conflicts_with = "config", required_unless_present = "config")]
        base_dir: Option<PathBuf>,

        /// Output directory (default: <base_dir>/<experiment>_analyzed)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated protocol ids to analyze (default: all)
        #[arg(short, long, value_delimiter = ',')]
        protocols: Option<Vec<Protocol>>,

        /// Number of parallel workers (0 = auto-detect)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Abort when protocols do not share one event timeline
        #[arg(long)]
        strict_timeline: bool,
    },

    /// Validate job plans, attach overlay graphs and expand `all`
    Plan {
        /// Job plans JSON file
        plans: PathBuf,

        /// Write resolved plans here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build one overlay graph and export it as JSON
    Topology {
        /// Number of nodes
        #[arg(short, long)]
        nodes: usize,

        /// Target average degree
        #[arg(short, long)]
        degree: usize,

        /// Write the graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    match cli.command {
        Commands::Analyze {
            config,
            experiment,
            base_dir,
            output,
            protocols,
            threads,
            strict_timeline,
        } => {
            let overrides = CliOverrides {
                output_dir: output,
                protocols,
                threads,
                strict_timeline,
            };
            let config = resolve_config(config.as_deref(), experiment, base_dir, &overrides)?;

            if config.threads > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .build_global()
                    .context("Failed to configure thread pool")?;
            }

            let summary = analysis::run_analysis(&config)?;
            analysis::print_summary(&summary);
        }
        Commands::Plan { plans, output } => {
            let resolved = plan::resolve_plans(plan::load_job_plans(&plans)?)?;
            let json = serde_json::to_string_pretty(&resolved).context("Failed to serialize plans")?;
            emit(&json, output.as_deref())?;
        }
        Commands::Topology {
            nodes,
            degree,
            output,
        } => {
            let graph = Graph::build(nodes, degree)?;
            let degrees = graph.degrees();
            info!(
                "Graph: {} nodes, {} edges, average degree {:.2}, degree range {}..={}, connected: {}",
                graph.node_count(),
                graph.edge_count(),
                graph.average_degree(),
                degrees.iter().min().copied().unwrap_or(0),
                degrees.iter().max().copied().unwrap_or(0),
                graph.is_connected()
            );
            let json = serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
            emit(&json, output.as_deref())?;
        }
    }

    Ok(())
}

/// Configuration from a file or from the command line, with overrides applied
fn resolve_config(
    config: Option<&Path>,
    experiment: Option<String>,
    base_dir: Option<PathBuf>,
    overrides: &CliOverrides,
) -> Result<AnalysisConfig> {
    let mut config = match (config, experiment, base_dir) {
        (Some(path), _, _) => config_loader::load_config(path)?,
        (None, Some(experiment), Some(base_dir)) => AnalysisConfig::new(experiment, base_dir),
        _ => bail!("Either --config or both --experiment and --base-dir are required"),
    };
    config_loader::apply_overrides(&mut config, overrides)?;
    Ok(config)
}

/// Write to a file, or to stdout when no path is given
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
