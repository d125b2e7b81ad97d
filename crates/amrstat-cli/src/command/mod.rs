use clap::{Parser, Subcommand};

use self::{dataset::DatasetArg, report::ReportArg};

mod dataset;
mod report;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What to run; defaults to `report` on the built-in study data
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Compute resistance statistics and association tests
    Report(#[clap(flatten)] ReportArg),
    /// Write the built-in study dataset as JSON
    Dataset(#[clap(flatten)] DatasetArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode.unwrap_or(Mode::Report(ReportArg::default())) {
        Mode::Report(arg) => report::run(&arg)?,
        Mode::Dataset(arg) => dataset::run(&arg)?,
    }
    Ok(())
}
