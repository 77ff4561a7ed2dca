use anyhow::{ensure, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; entry `n` brings the store to version `n + 1`.
const SCHEMAS: &[&str] = &[
    include_str!("schemas/schema_v1.sql"),
    include_str!("schemas/schema_v2.sql"),
];

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("cannot read store schema version")?;
    usize::try_from(version).with_context(|| format!("corrupt store schema version {version}"))
}

/// Bring the time-series store up to the latest schema in one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    ensure!(
        current <= SCHEMAS.len(),
        "store schema v{current} was written by a newer release (this one knows up to v{})",
        SCHEMAS.len()
    );

    let pending = &SCHEMAS[current..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction().context("cannot start schema upgrade")?;
    for (offset, script) in pending.iter().enumerate() {
        let version = current + offset + 1;
        tx.execute_batch(script)
            .with_context(|| format!("schema v{version} did not apply"))?;
    }
    tx.pragma_update(None, "user_version", SCHEMAS.len() as i64)
        .context("cannot record store schema version")?;
    tx.commit().context("cannot commit schema upgrade")?;

    info!("Upgraded time-series store schema v{current} -> v{}", SCHEMAS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_reaches_latest_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMAS.len());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('datapoints', 'rte_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMAS.len());
    }

    #[test]
    fn test_partial_store_is_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMAS[0]).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        run_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), SCHEMAS.len());
    }

    #[test]
    fn test_newer_store_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMAS.len() as i64 + 1)
            .unwrap();
        let err = run_migrations(&mut conn).unwrap_err();
        assert!(err.to_string().contains("newer release"));
    }
}
