//! Export query results to CSV and JSON.
//!
//! The exports are meant to be easy to consume in spreadsheets or by an
//! external rendering layer. The JSON report schema is defined by
//! `domain::ReportFile`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::app::pipeline::ReportOutput;
use crate::domain::{
    GenreTotalRow, JapanSharePoint, RegionSalesRow, ReportFile, RunConfig, TimelinePoint,
};
use crate::error::AppError;

/// Write Genre Totals rows to a CSV file.
pub fn write_genre_totals_csv(path: &Path, rows: &[GenreTotalRow]) -> Result<(), AppError> {
    let mut file = create(path)?;
    write_line(&mut file, "genre,total_global_sales")?;
    for r in rows {
        write_line(&mut file, &format!("{},{:.2}", r.genre, r.total_global_sales))?;
    }
    Ok(())
}

/// Write Timeline rows to a CSV file.
pub fn write_timeline_csv(path: &Path, rows: &[TimelinePoint]) -> Result<(), AppError> {
    let mut file = create(path)?;
    write_line(&mut file, "year,platform,total_global_sales")?;
    for r in rows {
        write_line(
            &mut file,
            &format!("{},{},{:.2}", r.year, r.platform, r.total_global_sales),
        )?;
    }
    Ok(())
}

/// Write Regional Sales rows to a CSV file.
pub fn write_regions_csv(path: &Path, rows: &[RegionSalesRow]) -> Result<(), AppError> {
    let mut file = create(path)?;
    write_line(&mut file, "platform,region,total_sales,platform_total")?;
    for r in rows {
        write_line(
            &mut file,
            &format!(
                "{},{},{:.2},{:.2}",
                r.platform,
                r.region.label(),
                r.total_sales,
                r.platform_total
            ),
        )?;
    }
    Ok(())
}

/// Write Japan Share rows to a CSV file.
pub fn write_share_csv(path: &Path, rows: &[JapanSharePoint]) -> Result<(), AppError> {
    let mut file = create(path)?;
    write_line(
        &mut file,
        "name,platform,genre,publisher,global_sales,jp_sales,jp_share",
    )?;
    for r in rows {
        write_line(
            &mut file,
            &format!(
                "{},{},{},{},{:.2},{:.2},{:.4}",
                csv_escape(&r.name),
                r.platform,
                r.genre,
                csv_escape(&r.publisher),
                r.global_sales,
                r.jp_sales,
                r.jp_share
            ),
        )?;
    }
    Ok(())
}

/// Write the full report (parameters + all four result sets) as JSON.
pub fn write_report_json(path: &Path, config: &RunConfig, output: &ReportOutput) -> Result<(), AppError> {
    let file = create(path)?;

    let report = ReportFile {
        tool: "vgs".to_string(),
        dataset: config.csv_path.display().to_string(),
        genre: config.genre.clone(),
        top_platforms: config.top_platforms,
        min_global: config.min_global,
        genre_totals: output.genre_totals.clone(),
        timeline: output.timeline.clone(),
        regional_sales: output.regional.clone(),
        japan_share: output.japan_share.clone(),
    };

    serde_json::to_writer_pretty(file, &report)
        .map_err(|e| AppError::data_load(format!("Failed to write report JSON: {e}")))?;

    Ok(())
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::data_load(format!("Failed to create export '{}': {e}", path.display())))
}

fn write_line(file: &mut File, line: &str) -> Result<(), AppError> {
    writeln!(file, "{line}").map_err(|e| AppError::data_load(format!("Failed to write export row: {e}")))
}

/// Game names and publishers can contain commas.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
