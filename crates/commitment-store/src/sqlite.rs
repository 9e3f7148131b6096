//! SQLite implementation of the Ledger trait.
//!
//! Persistent ledger using rusqlite with bundled SQLite, wrapped in async via
//! tokio::spawn_blocking. Each record is one row holding its CBOR encoding
//! plus the columns the protocol queries filter on.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use commitment_core::{CommitmentPacketMetadata, CommitmentState, CommitmentType, Cpid};

use crate::error::{Result, StoreError};
use crate::memory::{check_id, poisoned};
use crate::migration::{self, now_millis};
use crate::traits::Ledger;

/// Ledger stored in a SQLite file.
///
/// The connection sits behind a mutex and every call runs on the blocking
/// pool.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open or create the ledger file at `path`, upgrading its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A throwaway ledger in SQLite's in-memory mode.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(poisoned)?;
            f(&mut conn)
        })
        .await?
    }
}

fn encode_record(record: &CommitmentPacketMetadata) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_record(bytes: &[u8]) -> Result<CommitmentPacketMetadata> {
    let record: CommitmentPacketMetadata =
        ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    check_id(&record)?;
    Ok(record)
}

fn kind_str(kind: CommitmentType) -> &'static str {
    match kind {
        CommitmentType::Issuance => "Issuance",
        CommitmentType::Transfer => "Transfer",
    }
}

fn state_str(state: CommitmentState) -> &'static str {
    match state {
        CommitmentState::Created => "Created",
        CommitmentState::Transferred => "Transferred",
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn append(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        check_id(record)?;
        let encoded = encode_record(record)?;
        let record = record.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let id = record.cpid();

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM commitments WHERE cpid = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::Duplicate(id));
            }

            let packet = &record.commitment_packet;
            tx.execute(
                "INSERT INTO commitments (
                    cpid, owner, kind, state, asset_id, data, network,
                    previous_cpid, spending_tx, record, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id.0.as_slice(),
                    record.owner,
                    kind_str(record.kind),
                    state_str(record.state),
                    packet.asset_id,
                    packet.data,
                    packet.blockchain_id.as_str(),
                    packet.previous_packet.as_ref().map(|p| p.0.to_vec()),
                    record.spending_tx,
                    encoded,
                    now_millis(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn replace(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        check_id(record)?;
        let encoded = encode_record(record)?;
        let record = record.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let id = record.cpid();

            let changed = tx.execute(
                "UPDATE commitments
                 SET owner = ?2, kind = ?3, state = ?4, spending_tx = ?5,
                     record = ?6, updated_at = ?7
                 WHERE cpid = ?1",
                params![
                    id.0.as_slice(),
                    record.owner,
                    kind_str(record.kind),
                    state_str(record.state),
                    record.spending_tx,
                    encoded,
                    now_millis(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn by_cpid(&self, id: &Cpid) -> Result<Option<CommitmentPacketMetadata>> {
        let id = *id;
        self.blocking(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM commitments WHERE cpid = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            bytes.map(|b| decode_record(&b)).transpose()
        })
        .await
    }

    async fn records(&self) -> Result<Vec<CommitmentPacketMetadata>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT record FROM commitments ORDER BY seq")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.iter().map(|b| decode_record(b)).collect()
        })
        .await
    }

    async fn len(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM commitments", [], |row| row.get(0))?;
            usize::try_from(count).map_err(|e| StoreError::InvalidData(e.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{issuance, transfer_template};
    use crate::traits::LedgerExt;
    use commitment_core::Network;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_and_get() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let record = issuance("alice", "tok-1", Network::Bsv);

        ledger.append(&record).await.unwrap();

        let retrieved = ledger.by_cpid(&record.cpid()).await.unwrap().unwrap();
        assert_eq!(retrieved, record);
        assert!(ledger.by_cpid(&Cpid::from_bytes([0; 32])).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_missing() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let record = issuance("alice", "tok-1", Network::Bsv);

        assert!(matches!(
            ledger.replace(&record).await,
            Err(StoreError::NotFound(_))
        ));
        ledger.append(&record).await.unwrap();
        assert!(matches!(
            ledger.append(&record).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_records_keep_append_order() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let root = issuance("alice", "tok-1", Network::Eth);
        let second = transfer_template(&root, "bob", "0xbeef");
        ledger.append(&root).await.unwrap();
        ledger.append(&second).await.unwrap();

        let mut spent = root.clone();
        spent.state = CommitmentState::Transferred;
        spent.spending_tx = Some("0xspend".into());
        ledger.replace(&spent).await.unwrap();

        let records = ledger.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], spent);
        assert_eq!(records[1], second);
        assert_eq!(ledger.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_queries_over_sqlite() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let root = issuance("alice", "tok-1", Network::Bsv);
        let template = transfer_template(&root, "bob", "bb:1");
        ledger.append(&root).await.unwrap();
        ledger.append(&template).await.unwrap();

        assert!(ledger.can_complete(&template.cpid(), "alice").await.unwrap());
        assert_eq!(ledger.pending_transfers_into("alice").await.unwrap().len(), 1);
        let history = ledger.history(template.cpid()).await.unwrap();
        assert!(history.is_complete());
        assert_eq!(history.links.len(), 2);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let record = issuance("alice", "tok-1", Network::Bsv);
        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.append(&record).await.unwrap();
        }
        let ledger = SqliteLedger::open(&path).unwrap();
        assert_eq!(ledger.records().await.unwrap(), vec![record]);
    }
}
