//! Shared report pipeline used by every CLI subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> query execution -> typed result rows
//!
//! The CLI can then focus on presentation (printing vs exports).

use crate::domain::{GenreTotalRow, JapanSharePoint, RegionSalesRow, RunConfig, TimelinePoint};
use crate::error::AppError;
use crate::io::ingest::{IngestedData, load_records};
use crate::queries;

/// All computed outputs of a single `vgs report` run.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub ingest: IngestedData,
    pub genre_totals: Vec<GenreTotalRow>,
    pub timeline: Vec<TimelinePoint>,
    pub regional: Vec<RegionSalesRow>,
    pub japan_share: Vec<JapanSharePoint>,
}

/// Load the dataset and run all four queries.
pub fn run_report(config: &RunConfig) -> Result<ReportOutput, AppError> {
    let ingest = load_records(&config.csv_path)?;
    run_report_with_ingest(config, ingest)
}

/// Run all four queries over a pre-loaded dataset.
///
/// The queries only share the read-only record slice, so they run in
/// parallel; each allocates its own output rows.
pub fn run_report_with_ingest(
    config: &RunConfig,
    ingest: IngestedData,
) -> Result<ReportOutput, AppError> {
    let records = &ingest.records;

    let ((genre_totals, timeline), (regional, japan_share)) = rayon::join(
        || {
            rayon::join(
                || queries::run_genre_totals(records),
                || queries::run_timeline(records, &config.genre),
            )
        },
        || {
            rayon::join(
                || queries::run_regional_sales(records, config.top_platforms),
                || queries::run_japan_share(records, config.min_global),
            )
        },
    );

    Ok(ReportOutput {
        genre_totals: genre_totals?,
        timeline: timeline?,
        regional: regional?,
        japan_share: japan_share?,
        ingest,
    })
}
