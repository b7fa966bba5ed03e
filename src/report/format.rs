//! Plain-text tables for the four queries plus a dataset summary.

use crate::domain::{GenreTotalRow, JapanSharePoint, RegionSalesRow, TimelinePoint};
use crate::io::ingest::IngestedData;

/// How many Japan-share rows to print before truncating. Exports always
/// contain the full set.
const SHARE_DISPLAY_LIMIT: usize = 20;

/// Format the dataset summary (rows read/used + stats).
pub fn format_dataset_summary(ingest: &IngestedData) -> String {
    let mut out = String::new();

    out.push_str("=== vgs - Video Game Sales Report ===\n");
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    match (ingest.stats.year_min, ingest.stats.year_max) {
        (Some(lo), Some(hi)) => out.push_str(&format!("Years: {lo}-{hi}\n")),
        _ => out.push_str("Years: (none)\n"),
    }
    out.push_str(&format!(
        "Total global sales: {:.2}M across {} titles\n",
        ingest.stats.global_total, ingest.stats.n_records
    ));

    out
}

/// Format the Genre Totals table.
pub fn format_genre_totals(rows: &[GenreTotalRow]) -> String {
    let mut out = String::new();
    out.push_str("Total global sales by genre:\n");
    out.push_str(&format!("{:<14} {:>10}\n", "Genre", "Sales (M)"));
    for r in rows {
        out.push_str(&format!("{:<14} {:>10.2}\n", r.genre, r.total_global_sales));
    }
    out
}

/// Format the Timeline table for one genre.
pub fn format_timeline(genre: &str, rows: &[TimelinePoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Yearly global sales by platform ({genre}):\n"));
    if rows.is_empty() {
        out.push_str("  (no data - unknown genre or no dated releases)\n");
        return out;
    }
    out.push_str(&format!("{:>6} {:<10} {:>10}\n", "Year", "Platform", "Sales (M)"));
    for r in rows {
        out.push_str(&format!(
            "{:>6} {:<10} {:>10.2}\n",
            r.year, r.platform, r.total_global_sales
        ));
    }
    out
}

/// Format the Regional Sales table.
pub fn format_regions(rows: &[RegionSalesRow]) -> String {
    let mut out = String::new();
    out.push_str("Regional sales by platform:\n");
    out.push_str(&format!(
        "{:<10} {:<6} {:>10} {:>14}\n",
        "Platform", "Region", "Sales (M)", "Platform total"
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:<6} {:>10.2} {:>14.2}\n",
            r.platform,
            r.region.label(),
            r.total_sales,
            r.platform_total
        ));
    }
    out
}

/// Format the Japan Share listing (truncated for the terminal).
pub fn format_japan_share(rows: &[JapanSharePoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Japan share of global sales ({} titles):\n", rows.len()));
    out.push_str(&format!(
        "{:<36} {:<10} {:<14} {:>10} {:>8}\n",
        "Name", "Platform", "Genre", "Global (M)", "JP share"
    ));
    for r in rows.iter().take(SHARE_DISPLAY_LIMIT) {
        out.push_str(&format!(
            "{:<36} {:<10} {:<14} {:>10.2} {:>7.1}%\n",
            truncate(&r.name, 36),
            r.platform,
            r.genre,
            r.global_sales,
            r.jp_share * 100.0
        ));
    }
    if rows.len() > SHARE_DISPLAY_LIMIT {
        out.push_str(&format!("  (+{} more; use --export for the full set)\n", rows.len() - SHARE_DISPLAY_LIMIT));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
