//! Causal kernel CLI: Hilbert transforms, Kramers-Kronig checks, causal
//! projection, constrained optimization and causality gating of spectral data.
//!
//! This is the main entry point for the `causal-kernel` tool.

mod config;
mod input;
mod orchestrator;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{CheckTask, GateTask, GridSource, OptimizeTask, ProjectTask, Task, TransformTask};
use lib_causal::{GateConfig, OptimizerConfig, ProjectorConfig};
use lib_dsp::{Parity, TransformMethod};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "causal-kernel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Hilbert transform of one column
    Transform {
        /// CSV file with an omega column followed by data columns
        input: PathBuf,

        /// Column to transform (first data column if omitted)
        #[arg(short, long)]
        column: Option<String>,

        /// Numerical strategy (kernel, pv_quad, fft, odd_fft, odd_fft_uniform)
        #[arg(short, long, default_value = "odd_fft")]
        method: TransformMethod,

        /// Treat the data as the positive half of an even function
        #[arg(long)]
        even: bool,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check Kramers-Kronig consistency of a sigma1/sigma2 pair
    Check {
        input: PathBuf,

        #[arg(long, default_value = "sigma1")]
        sigma1: String,

        #[arg(long, default_value = "sigma2")]
        sigma2: String,

        #[arg(short, long, default_value = "odd_fft")]
        method: TransformMethod,

        /// Relative error tolerance
        #[arg(long, default_value = "0.12")]
        tol: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Project a spectral density onto the causal subspace
    Project {
        input: PathBuf,

        #[arg(short, long)]
        column: Option<String>,

        #[arg(short, long, default_value = "odd_fft")]
        method: TransformMethod,

        /// Projection iteration cap
        #[arg(long, default_value = "100")]
        max_iter: usize,

        /// Relative update at which projection stops
        #[arg(long, default_value = "0.01")]
        tol: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Minimize the free energy under the causality constraint
    Optimize {
        /// CSV file whose first column is the grid (linspace grid if omitted)
        #[arg(long)]
        grid: Option<PathBuf>,

        #[arg(long, default_value = "0.01")]
        omega_min: f64,

        #[arg(long, default_value = "10.0")]
        omega_max: f64,

        #[arg(long, default_value = "512")]
        points: usize,

        /// Information temperature
        #[arg(long, default_value = "1.0")]
        theta: f64,

        /// Energy kernel
        #[arg(long, default_value = "canonical")]
        kernel: String,

        #[arg(short, long, default_value = "odd_fft")]
        method: TransformMethod,

        #[arg(long, default_value = "80")]
        max_iter: usize,

        #[arg(long, default_value = "5e-6")]
        tol: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the causality gate on a sigma1/sigma2 pair
    Gate {
        input: PathBuf,

        #[arg(long, default_value = "sigma1")]
        sigma1: String,

        #[arg(long, default_value = "sigma2")]
        sigma2: String,

        #[arg(short, long, default_value = "odd_fft")]
        method: TransformMethod,

        /// Subtract a constant UV tail offset before the KK transforms
        #[arg(long)]
        use_subtracted: bool,

        /// Skip the causal projection step
        #[arg(long)]
        no_projection: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of tasks from a TOML or JSON configuration file
    Run {
        /// Path to the analysis configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let (task, output) = match cli.command {
        Commands::Run { config, output } => return run_batch(&config, &output, cli.format),
        Commands::Transform { input, column, method, even, output } => {
            let parity = if even { Parity::Even } else { Parity::Odd };
            let task = Task::Transform(TransformTask {
                name: None,
                input,
                column,
                method,
                parity,
                settings: Default::default(),
            });
            (task, output)
        }
        Commands::Check { input, sigma1, sigma2, method, tol, output } => {
            let task = Task::Check(CheckTask {
                name: None,
                input,
                sigma1,
                sigma2,
                method,
                tol,
                settings: Default::default(),
            });
            (task, output)
        }
        Commands::Project { input, column, method, max_iter, tol, output } => {
            let task = Task::Project(ProjectTask {
                name: None,
                input,
                column,
                method,
                settings: ProjectorConfig {
                    max_iter,
                    tol,
                    ..Default::default()
                },
            });
            (task, output)
        }
        Commands::Optimize {
            grid,
            omega_min,
            omega_max,
            points,
            theta,
            kernel,
            method,
            max_iter,
            tol,
            output,
        } => {
            let grid = match grid {
                Some(input) => GridSource::File { input },
                None => GridSource::Linspace { omega_min, omega_max, points },
            };
            let task = Task::Optimize(OptimizeTask {
                name: None,
                grid,
                settings: OptimizerConfig {
                    kernel,
                    method,
                    max_iter,
                    tol,
                    ..OptimizerConfig::with_theta(theta)
                },
            });
            (task, output)
        }
        Commands::Gate { input, sigma1, sigma2, method, use_subtracted, no_projection, output } => {
            let task = Task::Gate(GateTask {
                name: None,
                input,
                sigma1,
                sigma2,
                settings: GateConfig {
                    method,
                    use_subtracted,
                    enforce_projection: !no_projection,
                    ..Default::default()
                },
            });
            (task, output)
        }
    };

    let report = orchestrator::run_task(&task)?;
    output::emit(&report, cli.format, output.as_deref())?;

    Ok(())
}

fn run_batch(config_path: &PathBuf, output_dir: &PathBuf, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading configuration from {:?}", config_path);

    let config = config::load_config(config_path)?;
    let reports = orchestrator::Orchestrator::new(config).run()?;

    let written = output::write_reports(&reports, output_dir, format)?;
    println!("Wrote {} files to {:?}", written.len(), output_dir);

    Ok(())
}
