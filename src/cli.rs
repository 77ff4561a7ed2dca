//! Command line arguments

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rte-kpi")]
#[command(version)]
#[command(about = "Round-trip-efficiency KPIs for the energy storage process", long_about = None)]
pub struct Cli {
    /// SQLite time-series store
    #[arg(long, value_name = "PATH", default_value = "rte.sqlite3")]
    pub db: PathBuf,

    /// JSON settings file (defaults apply when missing)
    #[arg(long, value_name = "PATH", default_value = "settings.json")]
    pub settings: PathBuf,

    /// Log block-level details
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute and store the KPIs for the day before yesterday
    Run {
        /// Reference day (UTC); defaults to today
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Print the RTE blocks found in a window as JSON
    Blocks {
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Do not search previous days for a carried-over charging block
        #[arg(long)]
        no_backfill: bool,
    },
    /// Load datapoints for one series from a JSON array of {timestamp, value}
    Import {
        #[arg(long, value_name = "EXTERNAL_ID")]
        series: String,
        file: PathBuf,
    },
    /// List stored daily results
    Runs,
    /// Write the default settings file
    InitSettings,
}
