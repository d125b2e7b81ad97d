use amrstat_analysis::report::Report;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// JSON document written by `report --output`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument<'a> {
    /// Timestamp when the document was written (ISO 8601 format)
    pub generated_at: DateTime<Utc>,
    /// Where the counts came from
    pub source: DataSource,
    pub report: &'a Report,
}

/// Origin of the analysed counts
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// The study dataset compiled into the binary
    BuiltIn,
    /// A dataset JSON file
    File { path: String },
}
