//! ## tidvakt-cli
//! **Operational entry point**
//! Runs the reference workloads against the event bus on a virtual clock and
//! converts filter rule tables between their config and binary forms.

use clap::Parser;

mod commands;
mod rules;
mod scenarios;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    commands::run_command(Cli::parse())
}
