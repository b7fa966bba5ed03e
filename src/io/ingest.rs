//! CSV ingest and normalization.
//!
//! This module turns the wide video-game sales CSV into a clean `Vec<Record>`
//! that is safe to query.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Null-tolerant years** (`""` / `"N/A"` / unparseable stay `None`)
//! - **Separation of concerns**: no aggregation logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{DatasetStats, Record};
use crate::error::AppError;

/// The wide dataset's column names, as validated against the header row
/// (case-insensitive).
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Name",
    "Platform",
    "Year",
    "Genre",
    "Publisher",
    "NA_Sales",
    "EU_Sales",
    "JP_Sales",
    "Other_Sales",
    "Global_Sales",
];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub name: Option<String>,
    pub message: String,
}

/// Ingest output: parsed records + stats + row errors.
///
/// The record vector is read-only once built and can be shared across
/// concurrently running queries.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<Record>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and validate the dataset CSV.
pub fn load_records(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::data_load(format!("Failed to open CSV '{}': {e}", path.display())))?;
    ingest_records(file)
}

/// Ingest from any reader (used directly by tests).
pub fn ingest_records<R: Read>(reader: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::data_load(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    name: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(row) => records.push(row),
            Err((name, message)) => row_errors.push(RowError {
                line,
                name,
                message,
            }),
        }
    }

    let rows_used = records.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows remain after validation."));
    }

    let stats = compute_stats(&records);

    Ok(IngestedData {
        records,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header (e.g. "﻿Name"). If we don't strip it, schema validation
    // will incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    for column in REQUIRED_COLUMNS {
        if !header_map.contains_key(&column.to_ascii_lowercase()) {
            return Err(AppError::data_load(format!(
                "Missing required column: `{column}`"
            )));
        }
    }
    Ok(())
}

type RowParseError = (Option<String>, String);

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Record, RowParseError> {
    let name = match get_required(record, header_map, "name") {
        Ok(s) => s.to_string(),
        Err(e) => return Err((None, e)),
    };

    let fail = |message: String| (Some(name.clone()), message);

    let platform = get_required(record, header_map, "platform").map_err(fail)?.to_string();
    let genre = get_required(record, header_map, "genre").map_err(fail)?.to_string();
    let publisher = get_required(record, header_map, "publisher").map_err(fail)?.to_string();

    // Missing, empty, or `N/A` years stay null; they are filtered out by the
    // timeline query, not rejected here.
    let year = parse_year(get_optional(record, header_map, "year"));

    let na_sales = parse_sales(record, header_map, "na_sales").map_err(fail)?;
    let eu_sales = parse_sales(record, header_map, "eu_sales").map_err(fail)?;
    let jp_sales = parse_sales(record, header_map, "jp_sales").map_err(fail)?;
    let other_sales = parse_sales(record, header_map, "other_sales").map_err(fail)?;
    let global_sales = parse_sales(record, header_map, "global_sales").map_err(fail)?;

    Ok(Record {
        name,
        platform,
        year,
        genre,
        publisher,
        na_sales,
        eu_sales,
        jp_sales,
        other_sales,
        global_sales,
    })
}

fn parse_year(s: Option<&str>) -> Option<i32> {
    let s = s?;
    if s.eq_ignore_ascii_case("n/a") {
        return None;
    }
    s.parse::<i32>().ok()
}

fn parse_sales(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    column: &str,
) -> Result<f64, String> {
    let raw = get_required(record, header_map, column)?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{column}` value '{raw}'."))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("Invalid `{column}` value '{raw}' (must be finite and >= 0)."));
    }
    Ok(v)
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn compute_stats(records: &[Record]) -> DatasetStats {
    let mut year_min = None;
    let mut year_max = None;
    let mut global_total = 0.0;

    for r in records {
        if let Some(y) = r.year {
            year_min = Some(year_min.map_or(y, |m: i32| m.min(y)));
            year_max = Some(year_max.map_or(y, |m: i32| m.max(y)));
        }
        global_total += r.global_sales;
    }

    DatasetStats {
        n_records: records.len(),
        year_min,
        year_max,
        global_total,
    }
}
