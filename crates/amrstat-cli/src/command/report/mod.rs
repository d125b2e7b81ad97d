//! Resistance report command
//!
//! Builds the report from the built-in study data or a dataset file, prints
//! the summary tables and charts, and optionally exports the charts (PNG and
//! CSV) and the full report as JSON.

mod chart;
mod plot;
mod table;

use std::path::PathBuf;

use amrstat_analysis::{
    dataset::Dataset,
    report::{BuildOptions, ReportBuilder},
};
use amrstat_stats::{
    association::{AssociationConfig, DEFAULT_ALPHA, DEFAULT_MIN_EXPECTED},
    exact::{
        DEFAULT_MAX_ENUMERATED_TABLES, DEFAULT_MONTE_CARLO_REPLICATES, DEFAULT_SEED, ExactConfig,
    },
};
use anyhow::Context;
use chrono::Utc;
use clap::Args;

use crate::{
    schema::report::{DataSource, ReportDocument},
    util::{self, Output},
};

#[derive(Debug, Clone, Args)]
pub(crate) struct ReportArg {
    /// Path to a dataset JSON file (defaults to the built-in study data)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Significance level for the association tests
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Smallest expected cell count for which the chi-square test is used;
    /// tables with a smaller expected count get an exact test
    #[arg(long, default_value_t = DEFAULT_MIN_EXPECTED)]
    pub min_expected: f64,

    /// Largest number of tables enumerated by the exact test before falling
    /// back to a Monte-Carlo estimate
    #[arg(long, default_value_t = DEFAULT_MAX_ENUMERATED_TABLES)]
    pub max_enumerated_tables: u64,

    /// Number of Monte-Carlo replicates
    #[arg(long, default_value_t = DEFAULT_MONTE_CARLO_REPLICATES)]
    pub replicates: usize,

    /// Seed for the Monte-Carlo estimate
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Write the full report as JSON to this path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Directory for chart images (PNG) and chart data (CSV)
    #[arg(long)]
    pub chart_dir: Option<PathBuf>,

    /// TrueType/OpenType font used for text in chart images
    #[arg(long)]
    pub chart_font: Option<PathBuf>,

    /// Antibiotic shown in the distribution chart
    #[arg(long, default_value = "Colistin")]
    pub distribution_drug: String,
}

impl Default for ReportArg {
    fn default() -> Self {
        Self {
            data: None,
            alpha: DEFAULT_ALPHA,
            min_expected: DEFAULT_MIN_EXPECTED,
            max_enumerated_tables: DEFAULT_MAX_ENUMERATED_TABLES,
            replicates: DEFAULT_MONTE_CARLO_REPLICATES,
            seed: DEFAULT_SEED,
            output: None,
            chart_dir: None,
            chart_font: None,
            distribution_drug: "Colistin".to_owned(),
        }
    }
}

impl ReportArg {
    fn build_options(&self) -> anyhow::Result<BuildOptions> {
        anyhow::ensure!(
            self.alpha > 0.0 && self.alpha < 1.0,
            "--alpha must be between 0 and 1, got {}",
            self.alpha
        );
        anyhow::ensure!(
            self.min_expected >= 0.0,
            "--min-expected must not be negative, got {}",
            self.min_expected
        );
        anyhow::ensure!(self.replicates > 0, "--replicates must be positive");

        Ok(BuildOptions {
            association: AssociationConfig {
                min_expected: self.min_expected,
                alpha: self.alpha,
                exact: ExactConfig {
                    max_enumerated_tables: self.max_enumerated_tables,
                    monte_carlo_replicates: self.replicates,
                    seed: self.seed,
                },
            },
        })
    }
}

pub(crate) fn run(arg: &ReportArg) -> anyhow::Result<()> {
    let options = arg.build_options()?;
    let (dataset, source) = match &arg.data {
        Some(path) => (
            util::read_dataset_file(path)?,
            DataSource::File {
                path: path.display().to_string(),
            },
        ),
        None => (Dataset::study(), DataSource::BuiltIn),
    };

    eprintln!(
        "Analysing {} antibiotics across {} hospitals...",
        dataset.antibiotics.len(),
        dataset.hospitals.len()
    );
    let report = ReportBuilder::new(options)
        .build_dataset(&dataset)
        .context("Failed to build report")?;

    print!("{}", table::render_profile(&report)?);
    println!();
    if let Some(summary) = &report.panel_summary {
        print!("{}", table::render_panel_summary(summary)?);
        println!();
    }
    print!("{}", table::render_association_tests(&report)?);
    println!();

    if let Some(summary) = &report.panel_summary {
        println!("Resistance by antibiotic");
        print!("{}", chart::render_bar_chart(&summary.ranking, chart::BAR_WIDTH)?);
        println!();
    }
    match report.item(&arg.distribution_drug) {
        Some(item) => {
            println!(
                "{} susceptibility distribution (n={})",
                item.category,
                item.overall.breakdown.total()
            );
            print!("{}", chart::render_distribution(item, chart::BAR_WIDTH)?);
        }
        None => log::warn!(
            "antibiotic '{}' not in dataset, skipping distribution chart",
            arg.distribution_drug
        ),
    }

    if let Some(dir) = &arg.chart_dir {
        if let Some(font) = &arg.chart_font {
            plot::register_font(font)?;
        }
        for path in plot::save_chart_images(dir, &report, &arg.distribution_drug)? {
            eprintln!("Chart saved to: {}", path.display());
        }
        for path in chart::save_chart_data(dir, &report, &arg.distribution_drug)? {
            eprintln!("Chart data saved to: {}", path.display());
        }
    }

    if let Some(path) = &arg.output {
        let document = ReportDocument {
            generated_at: Utc::now(),
            source,
            report: &report,
        };
        Output::save_json(&document, Some(path.clone()))?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}
