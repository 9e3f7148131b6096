//! JSON snapshot implementation of the Ledger trait.
//!
//! The whole ledger is written as one pretty-printed JSON array after every
//! mutation. The new snapshot goes to a sibling temporary file which is then
//! renamed over the target, so a crash leaves either the old or the new
//! snapshot on disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use commitment_core::{CommitmentPacketMetadata, Cpid};
use tracing::{debug, info};

use crate::error::Result;
use crate::memory::{poisoned, LedgerState};
use crate::traits::Ledger;

/// File-backed ledger holding a full JSON snapshot.
///
/// Reads are served from memory. Writers are serialized by an async mutex and
/// the in-memory state only changes once the snapshot is on disk.
pub struct FileLedger {
    path: PathBuf,
    state: Arc<RwLock<LedgerState>>,
    writer: tokio::sync::Mutex<()>,
}

impl FileLedger {
    /// Open the snapshot at `path`.
    ///
    /// A missing file is an empty ledger, not an error. Every loaded record's
    /// identifier is recomputed and checked.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = load_snapshot(&path)?;
        info!(path = %path.display(), records = records.len(), "opened ledger snapshot");
        Ok(Self {
            state: Arc::new(RwLock::new(LedgerState::from_records(records)?)),
            path,
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to a copy of the state, persist it, then publish it.
    async fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut LedgerState) -> Result<()> + Send,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.state.read().map_err(poisoned)?.clone();
        mutate(&mut next)?;

        let bytes = serde_json::to_vec_pretty(next.records())?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;

        *self.state.write().map_err(poisoned)? = next;
        debug!(path = %self.path.display(), "ledger snapshot written");
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<CommitmentPacketMetadata>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl Ledger for FileLedger {
    async fn append(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        let record = record.clone();
        self.commit(move |state| state.append(record)).await
    }

    async fn replace(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        let record = record.clone();
        self.commit(move |state| state.replace(record)).await
    }

    async fn by_cpid(&self, id: &Cpid) -> Result<Option<CommitmentPacketMetadata>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.get(id).cloned())
    }

    async fn records(&self) -> Result<Vec<CommitmentPacketMetadata>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.records().to_vec())
    }

    async fn len(&self) -> Result<usize> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.records().len())
    }
}
