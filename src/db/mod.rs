use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

mod helpers;
mod migrations;

use helpers::{from_millis, parse_datetime, to_i64, to_millis};
use migrations::run_migrations;

use crate::models::Sample;
use crate::rte::DailyRte;
use crate::timeseries::{TimeSeriesSink, TimeSeriesSource};

/// A stored result of the daily KPI job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RteRun {
    pub day_start: DateTime<Utc>,
    pub linear: Option<f64>,
    pub simultaneous: Option<f64>,
    pub block_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// SQLite-backed time-series store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        info!("Opened time-series store at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Upsert datapoints for one series; returns the number written.
    pub fn insert_datapoints(&self, external_id: &str, samples: &[Sample]) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO datapoints (external_id, timestamp_ms, value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(external_id, timestamp_ms) DO UPDATE SET value = excluded.value",
            )?;
            for sample in samples {
                stmt.execute(params![external_id, to_millis(sample.timestamp), sample.value])?;
            }
        }
        tx.commit()
            .with_context(|| format!("failed to store datapoints for {external_id}"))?;
        Ok(samples.len())
    }

    pub fn record_run(&self, run: &DailyRte) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO rte_runs (day_start_ms, linear, simultaneous, block_count, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(day_start_ms) DO UPDATE SET
                linear = excluded.linear,
                simultaneous = excluded.simultaneous,
                block_count = excluded.block_count,
                computed_at = excluded.computed_at",
            params![
                to_millis(run.day_start),
                run.linear,
                run.simultaneous,
                to_i64(run.block_count)?,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("failed to record RTE run")?;
        Ok(())
    }

    pub fn list_runs(&self) -> Result<Vec<RteRun>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT day_start_ms, linear, simultaneous, block_count, computed_at
             FROM rte_runs ORDER BY day_start_ms",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (day_start_ms, linear, simultaneous, block_count, computed_at) = row?;
            runs.push(RteRun {
                day_start: from_millis(day_start_ms)?,
                linear,
                simultaneous,
                block_count: usize::try_from(block_count)
                    .with_context(|| format!("negative block_count {block_count}"))?,
                computed_at: parse_datetime(&computed_at, "computed_at")?,
            });
        }
        Ok(runs)
    }
}

impl TimeSeriesSource for Database {
    fn retrieve(
        &self,
        external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp_ms, value FROM datapoints
             WHERE external_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms < ?3
             ORDER BY timestamp_ms",
        )?;
        let rows = stmt.query_map(
            params![external_id, to_millis(start), to_millis(end)],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )?;

        let mut samples = Vec::new();
        for row in rows {
            let (timestamp_ms, value) = row?;
            samples.push(Sample::new(from_millis(timestamp_ms)?, value));
        }
        Ok(samples)
    }
}

impl TimeSeriesSink for Database {
    fn insert(&self, external_id: &str, samples: &[Sample]) -> Result<()> {
        self.insert_datapoints(external_id, samples).map(|_| ())
    }
}
