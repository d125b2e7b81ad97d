//! Susceptibility analysis of aggregated isolate counts
//!
//! This crate turns per-hospital susceptibility counts into percentage
//! breakdowns, association tests, and a structured report ready for
//! presentation.
//!
//! # Overview
//!
//! 1. **Load Counts** ([`dataset::Dataset`]): antibiotic panel with S/I/R counts
//!    per hospital and the sequence-type distribution
//! 2. **Summarize** ([`summary::CategoryBreakdown`]): percentages per outcome,
//!    ranking by resistance, panel-wide resistance statistics
//! 3. **Build Report** ([`report::ReportBuilder`]): one contingency table and
//!    association test per antibiotic, plus one for the sequence types
//!
//! The report is a plain value: building it twice from the same counts gives
//! the same report, and nothing is printed or written along the way.
//!
//! # Examples
//!
//! ```
//! use amrstat_analysis::{dataset::Dataset, report::ReportBuilder};
//!
//! let report = ReportBuilder::default()
//!     .build_dataset(&Dataset::study())
//!     .unwrap();
//!
//! for item in &report.items {
//!     match &item.test {
//!         Ok(result) => println!("{}: p = {:.3}", item.category, result.p_value),
//!         Err(err) => println!("{}: not tested ({err})", item.category),
//!     }
//! }
//!
//! let summary = report.panel_summary.as_ref().unwrap();
//! println!("Mean resistance: {:.1}%", summary.resistance.mean);
//! ```

pub mod dataset;
pub mod report;
pub mod summary;
