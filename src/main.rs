//! Command line interface for running malaria models
//!
//! # Usage
//!
//! ```bash
//! dmm run --model seasonal --eir 50 --time 365 --output run.json
//! dmm stable --config scenario.toml --tolerance 1e-5
//! ```

use clap::{Args, Parser, Subcommand};
use dmm::{Config, DmmResult, OutputFrame};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dmm")]
#[command(about = "Run deterministic malaria models from equilibrium")]
struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a model for a fixed number of days
    Run(RunArgs),
    /// Run a model until its output is stable
    Stable(StableArgs),
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model variant (base, seasonal or intervention)
    #[arg(short, long)]
    model: Option<String>,

    /// Annual entomological inoculation rate
    #[arg(long)]
    eir: Option<f64>,

    /// Fraction of clinical cases treated
    #[arg(long)]
    ft: Option<f64>,

    /// Write the output as JSON to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Number of days to simulate
    #[arg(short, long)]
    time: Option<usize>,
}

#[derive(Args, Debug)]
struct StableArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Largest difference between consecutive years which counts as stable
    #[arg(long)]
    tolerance: Option<f64>,

    /// Give up once a window would end after this day
    #[arg(long)]
    max_time: Option<f64>,
}

impl ScenarioArgs {
    fn load(&self) -> DmmResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };
        if let Some(model) = &self.model {
            config.scenario.model = model.clone();
        }
        if let Some(eir) = self.eir {
            config.scenario.init_eir = eir;
        }
        if let Some(ft) = self.ft {
            config.scenario.init_ft = ft;
        }
        Ok(config)
    }
}

fn execute(command: &Command) -> DmmResult<(OutputFrame, Option<PathBuf>)> {
    match command {
        Command::Run(args) => {
            let mut options = args.scenario.load()?.run_options();
            if let Some(time) = args.time {
                options.time = time;
            }
            info!(model = %options.scenario.model, days = options.time, "Running model");
            Ok((dmm::run_model(&options)?, args.scenario.output.clone()))
        }
        Command::Stable(args) => {
            let mut options = args.scenario.load()?.stability_options();
            if let Some(tolerance) = args.tolerance {
                options.stability.tolerance = tolerance;
            }
            if let Some(max_time) = args.max_time {
                options.stability.max_horizon = max_time;
            }
            info!(
                model = %options.scenario.model,
                tolerance = options.stability.tolerance,
                max_horizon = options.stability.max_horizon,
                "Running model until stable"
            );
            Ok((
                dmm::run_model_until_stable(&options)?,
                args.scenario.output.clone(),
            ))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (output, path) = match execute(&cli.command) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&output) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialise output: {}", e);
            std::process::exit(1);
        }
    };

    match path {
        Some(path) => {
            if let Err(e) = fs::write(&path, json) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            info!(path = %path.display(), rows = output.len(), "Wrote output");
        }
        None => println!("{}", json),
    }
}
