//! SQLite schema for the ledger.
//!
//! Steps run in order inside one transaction and are recorded in
//! `schema_migrations`. A database written by a newer build is refused.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Result, StoreError};

/// Schema steps; step `n` upgrades version `n` to `n + 1`.
const STEPS: &[&str] = &[LEDGER_V1];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

const LEDGER_V1: &str = r#"
    -- One row per ledger record, in append order
    CREATE TABLE commitments (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        cpid BLOB NOT NULL UNIQUE,        -- 32 bytes, SHA-256 of packet fields
        owner TEXT NOT NULL,
        kind TEXT NOT NULL,               -- Issuance | Transfer
        state TEXT NOT NULL,              -- Created | Transferred
        asset_id TEXT NOT NULL,
        data TEXT NOT NULL,
        network TEXT NOT NULL,            -- BSV | ETH
        previous_cpid BLOB,               -- NULL for issuance
        spending_tx TEXT,
        record BLOB NOT NULL,             -- CBOR-encoded metadata record
        updated_at INTEGER NOT NULL
    );

    CREATE INDEX idx_commitments_owner ON commitments(owner);
    CREATE INDEX idx_commitments_asset ON commitments(asset_id, data, network, state);
    CREATE INDEX idx_commitments_previous ON commitments(previous_cpid);
"#;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;
    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let Some(pending) = STEPS.get(applied as usize..) else {
        return Err(StoreError::Migration(format!(
            "ledger schema v{applied} is newer than supported v{CURRENT_VERSION}"
        )));
    };
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in (applied + 1..).zip(pending) {
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
        debug!(version, "applied ledger schema step");
    }
    tx.commit()?;
    Ok(())
}

/// Wall-clock milliseconds, or zero if the clock is before the epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_ledger_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"commitments".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_second_run_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
