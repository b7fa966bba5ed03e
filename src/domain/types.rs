//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during query execution
//! - exported to JSON/CSV
//! - consumed by an external rendering layer

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The fixed genre enumeration found in the source dataset.
///
/// Query parameters are validated against this set; an unrecognized genre label
/// yields an empty result rather than an error (documented permissive behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Sports,
    Shooter,
    #[serde(rename = "Role-Playing")]
    RolePlaying,
    Platform,
    Racing,
    Misc,
    Fighting,
    Simulation,
    Puzzle,
    Adventure,
    Strategy,
}

impl Genre {
    pub const ALL: [Genre; 12] = [
        Genre::Action,
        Genre::Sports,
        Genre::Shooter,
        Genre::RolePlaying,
        Genre::Platform,
        Genre::Racing,
        Genre::Misc,
        Genre::Fighting,
        Genre::Simulation,
        Genre::Puzzle,
        Genre::Adventure,
        Genre::Strategy,
    ];

    /// The label used in the dataset's `Genre` column.
    pub fn label(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Sports => "Sports",
            Genre::Shooter => "Shooter",
            Genre::RolePlaying => "Role-Playing",
            Genre::Platform => "Platform",
            Genre::Racing => "Racing",
            Genre::Misc => "Misc",
            Genre::Fighting => "Fighting",
            Genre::Simulation => "Simulation",
            Genre::Puzzle => "Puzzle",
            Genre::Adventure => "Adventure",
            Genre::Strategy => "Strategy",
        }
    }

    /// Resolve a user-supplied label (trimmed, case-insensitive).
    pub fn from_label(label: &str) -> Option<Genre> {
        let label = label.trim();
        Genre::ALL
            .iter()
            .copied()
            .find(|g| g.label().eq_ignore_ascii_case(label))
    }

    /// Position in the canonical enumeration, used as a deterministic tie-breaker
    /// when sorting display output.
    pub fn canonical_index(label: &str) -> usize {
        Genre::from_label(label)
            .map(|g| Genre::ALL.iter().position(|x| *x == g).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX)
    }
}

/// Sales region, mapping to the four regional `*_Sales` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "NA")]
    Na,
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "JP")]
    Jp,
    Other,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Na, Region::Eu, Region::Jp, Region::Other];

    /// The dataset column this region's sales live in.
    pub fn column(self) -> &'static str {
        match self {
            Region::Na => "NA_Sales",
            Region::Eu => "EU_Sales",
            Region::Jp => "JP_Sales",
            Region::Other => "Other_Sales",
        }
    }

    /// Short display label.
    pub fn label(self) -> &'static str {
        match self {
            Region::Na => "NA",
            Region::Eu => "EU",
            Region::Jp => "JP",
            Region::Other => "Other",
        }
    }

    /// Map a folded column name back to its region.
    pub fn from_column(column: &str) -> Option<Region> {
        Region::ALL.iter().copied().find(|r| r.column() == column)
    }
}

/// One row of the source dataset.
///
/// `global_sales` is expected to approximately equal the sum of the four
/// regional fields, but the two are tolerated as-is when they disagree; no
/// reconciliation is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub platform: String,
    /// `None` for missing, empty, `"N/A"`, or otherwise unparseable years.
    pub year: Option<i32>,
    pub genre: String,
    pub publisher: String,
    pub na_sales: f64,
    pub eu_sales: f64,
    pub jp_sales: f64,
    pub other_sales: f64,
    pub global_sales: f64,
}

/// Summary stats about the records actually loaded.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_records: usize,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub global_total: f64,
}

/// A full run's configuration as understood by the report pipeline.
///
/// This is derived from CLI flags (plus defaults); there is no process-wide
/// singleton holding the dataset location.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    /// Genre parameter for the timeline query (free-form; validated downstream).
    pub genre: String,
    /// Restrict the regional query to the top-N platforms by total sales.
    /// `None` leaves all platforms in (the unranked variant).
    pub top_platforms: Option<usize>,
    /// Minimum global sales (millions) for the Japan-share scatter set.
    pub min_global: f64,
    pub export: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Genre Totals result row: total global sales per genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreTotalRow {
    pub genre: String,
    pub total_global_sales: f64,
}

/// Timeline result row: global sales for one (year, platform) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub year: i32,
    pub platform: String,
    pub total_global_sales: f64,
}

/// Regional result row: one (platform, region) cell plus the platform's
/// grand total across all regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSalesRow {
    pub platform: String,
    pub region: Region,
    pub total_sales: f64,
    pub platform_total: f64,
}

/// Japan-share result row: per-game granularity, no aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JapanSharePoint {
    pub name: String,
    pub platform: String,
    pub genre: String,
    pub publisher: String,
    pub global_sales: f64,
    pub jp_sales: f64,
    /// `jp_sales / global_sales`; always finite and in `[0, 1]` for consistent data.
    pub jp_share: f64,
}

/// A saved report file (JSON): run parameters plus every query's result rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub dataset: String,
    pub genre: String,
    pub top_platforms: Option<usize>,
    pub min_global: f64,
    pub genre_totals: Vec<GenreTotalRow>,
    pub timeline: Vec<TimelinePoint>,
    pub regional_sales: Vec<RegionSalesRow>,
    pub japan_share: Vec<JapanSharePoint>,
}
