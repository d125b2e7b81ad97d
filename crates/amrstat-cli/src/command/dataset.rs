use std::path::PathBuf;

use amrstat_analysis::dataset::Dataset;
use clap::Args;

use crate::util::Output;

#[derive(Debug, Clone, Args)]
pub(crate) struct DatasetArg {
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Writes the built-in dataset, usable as a template for `report --data`.
pub(crate) fn run(arg: &DatasetArg) -> anyhow::Result<()> {
    let dataset = Dataset::study();
    Output::save_json(&dataset, arg.output.clone())
}
