//! Robust CVaR portfolio command line.
//!
//! Builds the worst-case CVaR model from a scenario file, solves it and
//! prints the result as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use robust_cvar::{
    config::RunConfig,
    frontier::efficient_frontier,
    lp_format::write_lp_file,
    scenario::ScenarioSet,
    solver::{backend, BackendKind},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "robust-cvar")]
#[command(about = "Multi-stage worst-case CVaR portfolio optimisation over rival scenario trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path; defaults plus RCVAR__ overrides when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured solver backend
    #[arg(short, long)]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the configured model
    Solve {
        /// Scenario JSON file
        scenarios: PathBuf,
        /// Also write the model in LP format
        #[arg(long)]
        lp_out: Option<PathBuf>,
    },
    /// Trace the worst-case CVaR / return frontier
    Frontier {
        /// Scenario JSON file
        scenarios: PathBuf,
        /// Number of points, overriding the config
        #[arg(short, long)]
        points: Option<usize>,
    },
    /// Write the model in LP format without solving
    ExportLp {
        /// Scenario JSON file
        scenarios: PathBuf,
        /// Output path
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::from_env()?,
    };
    if let Some(kind) = cli.backend {
        config.solver.backend = kind;
    }
    let settings = config.solver.settings()?;
    let solver = backend(config.solver.backend, &settings);

    match cli.command {
        Commands::Solve { scenarios, lp_out } => {
            let scenarios = ScenarioSet::from_file(&scenarios)?;
            let problem = config.problem(&scenarios)?;
            if let Some(path) = lp_out {
                write_lp_file(&problem.build_model()?, path)?;
            }
            let outcome = problem.solve(solver.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Frontier { scenarios, points } => {
            let scenarios = ScenarioSet::from_file(&scenarios)?;
            let problem = config.problem(&scenarios)?;
            let points = points.unwrap_or(config.frontier.points);
            let frontier = efficient_frontier(&problem, solver.as_ref(), points)?;
            println!("{}", serde_json::to_string_pretty(&frontier)?);
        }
        Commands::ExportLp { scenarios, output } => {
            let scenarios = ScenarioSet::from_file(&scenarios)?;
            let model = config.problem(&scenarios)?.build_model()?;
            write_lp_file(&model, &output)?;
        }
    }

    Ok(())
}
