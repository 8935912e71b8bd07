use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tidvakt_config::TidvaktConfig;
use tidvakt_telemetry::init_logging;
use tracing::info;

use crate::{rules, scenarios};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a reference workload on a virtual clock
    Run(RunArgs),
    /// Inspect or produce a binary filter rule buffer
    Rules(RulesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file; defaults to config/tidvakt.yaml and TIDVAKT_* variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Scenario::Priority)]
    pub scenario: Scenario,
    /// Processing cycles to run
    #[arg(long, default_value_t = 10)]
    pub cycles: u32,
    /// Virtual milliseconds between cycles
    #[arg(long, default_value_t = 250)]
    pub tick_ms: u32,
    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Single queue, no filters: a button drives an LED state machine
    Basic,
    /// Three priority levels with a filter rule table
    Priority,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("mode").required(true).args(["file", "encode"])))]
pub struct RulesArgs {
    /// Binary rule buffer to validate and print
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Configuration file whose rules are encoded
    #[arg(long, requires = "out")]
    pub encode: Option<PathBuf>,
    /// Destination of the encoded buffer
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = match &args.config {
                Some(path) => TidvaktConfig::load_from_path(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => TidvaktConfig::load()?,
            };
            init_logging(&config.telemetry.log_filter, config.telemetry.thread_names)?;

            let summary = scenarios::run(&config, &args)?;
            info!(
                scenario = ?args.scenario,
                cycles = summary.cycles,
                dispatched = summary.dispatched,
                published = summary.stats.published,
                filtered = summary.stats.filtered,
                halted = summary.halted,
                "run complete"
            );
            if let Some(metrics) = summary.metrics {
                print!("{metrics}");
            }
            Ok(())
        }
        Commands::Rules(args) => {
            init_logging("info", false)?;
            match (args.file, args.encode, args.out) {
                (Some(file), _, _) => rules::inspect(&file),
                (None, Some(config), Some(out)) => rules::encode(&config, &out),
                _ => anyhow::bail!("either --file or --encode with --out is required"),
            }
        }
    }
}
