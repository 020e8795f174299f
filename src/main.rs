mod config;
mod engine;
mod manager;
mod model;
mod patient;
mod stats;
mod types;

use crate::manager::Manager;
use crate::types::Scenario;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate simple viruses in an untreated patient.
    Simple,

    /// Simulate resistant viruses in a patient treated halfway through.
    Treated,

    /// Remove all run directories.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Simple => mgr.run_simulation(Scenario::Simple)?,
        Command::Treated => mgr.run_simulation(Scenario::Treated)?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
