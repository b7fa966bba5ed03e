//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the dataset CSV
//! - runs the requested queries
//! - prints tables
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, ReportArgs};
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::io::export;
use crate::io::ingest::load_records;
use crate::queries;
use crate::report;

pub mod pipeline;

/// Entry point for the `vgs` binary.
pub fn run() -> Result<(), AppError> {
    // We want `vgs` and `vgs --genre Sports` to behave like `vgs report ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of
    // the argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Report(args) => handle_report(args),
        Command::Genres(args) => handle_genres(args),
        Command::Timeline(args) => handle_timeline(args),
        Command::Regions(args) => handle_regions(args),
        Command::Share(args) => handle_share(args),
    }
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_report(&config)?;

    println!("{}", report::format_dataset_summary(&run.ingest));
    println!("{}", report::format_genre_totals(&run.genre_totals));
    println!("{}", report::format_timeline(&config.genre, &run.timeline));
    println!("{}", report::format_regions(&run.regional));
    println!("{}", report::format_japan_share(&run.japan_share));

    if let Some(path) = &config.export_json {
        export::write_report_json(path, &config, &run)?;
    }

    Ok(())
}

fn handle_genres(args: ReportArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let ingest = load_records(&config.csv_path)?;
    let rows = queries::run_genre_totals(&ingest.records)?;

    println!("{}", report::format_genre_totals(&rows));
    if let Some(path) = &config.export {
        export::write_genre_totals_csv(path, &rows)?;
    }
    Ok(())
}

fn handle_timeline(args: ReportArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let ingest = load_records(&config.csv_path)?;
    let rows = queries::run_timeline(&ingest.records, &config.genre)?;

    println!("{}", report::format_timeline(&config.genre, &rows));
    if let Some(path) = &config.export {
        export::write_timeline_csv(path, &rows)?;
    }
    Ok(())
}

fn handle_regions(args: ReportArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let ingest = load_records(&config.csv_path)?;
    let rows = queries::run_regional_sales(&ingest.records, config.top_platforms)?;

    println!("{}", report::format_regions(&rows));
    if let Some(path) = &config.export {
        export::write_regions_csv(path, &rows)?;
    }
    Ok(())
}

fn handle_share(args: ReportArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let ingest = load_records(&config.csv_path)?;
    let rows = queries::run_japan_share(&ingest.records, config.min_global)?;

    println!("{}", report::format_japan_share(&rows));
    if let Some(path) = &config.export {
        export::write_share_csv(path, &rows)?;
    }
    Ok(())
}

pub fn run_config_from_args(args: &ReportArgs) -> RunConfig {
    RunConfig {
        csv_path: args.data.clone(),
        genre: args.genre.clone(),
        top_platforms: if args.all_platforms { None } else { Some(args.top) },
        min_global: args.min_global,
        export: args.export.clone(),
        export_json: args.export_json.clone(),
    }
}

/// Rewrite argv so `vgs` defaults to `vgs report`.
///
/// Rules:
/// - `vgs`                     -> `vgs report`
/// - `vgs --genre Sports ...`  -> `vgs report --genre Sports ...`
/// - `vgs --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("report".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "report" | "genres" | "timeline" | "regions" | "share"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "report flags".
    if arg1.starts_with('-') {
        argv.insert(1, "report".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("vgs")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn bare_invocation_defaults_to_report() {
        assert_eq!(rewrite_args(argv(&[])), argv(&["report"]));
    }

    #[test]
    fn leading_flags_default_to_report() {
        assert_eq!(
            rewrite_args(argv(&["--genre", "Sports"])),
            argv(&["report", "--genre", "Sports"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        assert_eq!(rewrite_args(argv(&["genres"])), argv(&["genres"]));
        assert_eq!(rewrite_args(argv(&["--help"])), argv(&["--help"]));
    }
}
