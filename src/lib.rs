mod cli;
pub mod db;
pub mod models;
pub mod rte;
pub mod settings;
pub mod timeseries;
mod utils;

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::Serialize;

use cli::{Cli, Command};
use db::Database;
use models::{Block, Sample};
use rte::{calculate_rte_blocks, calculate_rte_time, divide_rte_blocks, process_rte_kpis};
use settings::Settings;
use timeseries::ChannelReader;

#[derive(Serialize)]
struct BlocksReport {
    blocks: Vec<Block>,
    unclosed_charging: Option<Block>,
    linear_hours: f64,
    simultaneous_hours: f64,
}

fn open_store(settings_path: &Path, db_path: &Path) -> Result<(Settings, Database)> {
    let settings = Settings::load(settings_path)?;
    let database = Database::open(db_path)?;
    Ok((settings, database))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still takes precedence
    utils::logging::init(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    match cli.command {
        Command::InitSettings => {
            Settings::default().save(&cli.settings)?;
            info!("Wrote default settings to {}", cli.settings.display());
        }
        Command::Run { date } => {
            let (settings, database) = open_store(&cli.settings, &cli.db)?;
            let reader = ChannelReader::new(&database, &settings.series);
            let today = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            match process_rte_kpis(today, &reader, &database, &settings.outputs, &settings.rte)? {
                Some(result) => {
                    database.record_run(&result)?;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                None => warn!("No RTE KPIs written for reference day {today}"),
            }
        }
        Command::Blocks {
            start,
            end,
            no_backfill,
        } => {
            if start >= end {
                bail!("window start {start} must be before end {end}");
            }
            let (settings, database) = open_store(&cli.settings, &cli.db)?;
            let reader = ChannelReader::new(&database, &settings.series);
            let (blocks, unclosed_charging) =
                calculate_rte_blocks(start, end, &reader, &settings.rte, !no_backfill)?;
            let (linear, simultaneous) = divide_rte_blocks(blocks.clone());
            let report = BlocksReport {
                linear_hours: calculate_rte_time(&linear),
                simultaneous_hours: calculate_rte_time(&simultaneous),
                blocks,
                unclosed_charging,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Import { series, file } => {
            let database = Database::open(&cli.db)?;
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read datapoints from {}", file.display()))?;
            let samples: Vec<Sample> = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid datapoints in {}", file.display()))?;
            let written = database.insert_datapoints(&series, &samples)?;
            info!("Imported {written} datapoints into {series}");
        }
        Command::Runs => {
            let database = Database::open(&cli.db)?;
            println!("{}", serde_json::to_string_pretty(&database.list_runs()?)?);
        }
    }

    Ok(())
}
