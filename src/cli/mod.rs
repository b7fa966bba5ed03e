//! Command-line parsing for the sales report tool.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the query/pipeline code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vgs", version, about = "Video-game sales aggregation reports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run all four queries and print their tables.
    Report(ReportArgs),
    /// Total global sales by genre.
    Genres(ReportArgs),
    /// Yearly global sales by platform for one genre.
    Timeline(ReportArgs),
    /// Regional sales by platform (top-N platforms by total sales).
    Regions(ReportArgs),
    /// Japan share of global sales, per game.
    Share(ReportArgs),
}

/// Common options shared by every subcommand.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Path to the wide sales dataset CSV.
    #[arg(long, default_value = "data/videogames_wide.csv")]
    pub data: PathBuf,

    /// Genre for the timeline query. An unrecognized genre prints an empty
    /// table rather than failing.
    #[arg(short = 'g', long, default_value = "Action")]
    pub genre: String,

    /// Keep only the top-N platforms by total sales in the regional query.
    #[arg(long, default_value_t = 15)]
    pub top: usize,

    /// Keep every platform in the regional query (ignore --top).
    #[arg(long)]
    pub all_platforms: bool,

    /// Minimum global sales (millions) for the Japan-share query.
    #[arg(long, default_value_t = 0.5)]
    pub min_global: f64,

    /// Export the subcommand's result rows to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the full report (all four result sets) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}
