//! Token registry: which content identifiers exist and who currently holds
//! each one.
//!
//! The registry is a satellite of the ledger. The engine consults it before
//! issuing and updates it after a transfer completes; when the two disagree
//! the ledger wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use commitment_core::Cpid;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::TokenConfig;
use crate::error::TokenError;

type Result<T> = std::result::Result<T, TokenError>;

/// A registered token and, once assigned, the packet that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: String,
    #[serde(default)]
    pub description: String,
    pub cpid: Option<Cpid>,
}

/// Registry of tokens, assigned or available.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Check if the registry knows `token_id` at all.
    async fn is_registered(&self, token_id: &str) -> Result<bool>;

    /// Check if `token_id` is registered and not assigned to anyone.
    async fn is_available(&self, token_id: &str) -> Result<bool>;

    /// Move an available token to `actor`, bound to `cpid`.
    async fn assign(&self, actor: &str, token_id: &str, cpid: Cpid) -> Result<()>;

    /// Move a token from `from` to `to`, rebinding it to `cpid`.
    async fn reassign(&self, from: &str, to: &str, token_id: &str, cpid: Cpid) -> Result<()>;

    /// Check if `actor` holds `token_id`.
    async fn owned_by(&self, actor: &str, token_id: &str) -> Result<bool>;

    /// Tokens held by `actor`.
    async fn tokens_of(&self, actor: &str) -> Result<Vec<TokenRecord>>;

    /// Put a token held by `actor` back into the available pool.
    async fn return_to_pool(&self, actor: &str, token_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct TokenState {
    available: BTreeMap<String, TokenRecord>,
    assigned: BTreeMap<String, Vec<TokenRecord>>,
}

impl TokenState {
    fn take_held(&mut self, actor: &str, token_id: &str) -> Result<TokenRecord> {
        let not_held = || TokenError::NotHeld {
            actor: actor.to_string(),
            token_id: token_id.to_string(),
        };
        let held = self.assigned.get_mut(actor).ok_or_else(not_held)?;
        let idx = held
            .iter()
            .position(|t| t.token_id == token_id)
            .ok_or_else(not_held)?;
        Ok(held.remove(idx))
    }

    fn give(&mut self, actor: &str, token: TokenRecord) {
        self.assigned.entry(actor.to_string()).or_default().push(token);
    }
}

/// In-process registry with optional JSON persistence of assignments.
pub struct MemoryTokenRegistry {
    state: Mutex<TokenState>,
    path: Option<PathBuf>,
}

impl MemoryTokenRegistry {
    /// An in-memory registry holding `tokens`, all available.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let available = tokens
            .into_iter()
            .map(|id| {
                let token_id = id.into();
                (
                    token_id.clone(),
                    TokenRecord {
                        token_id,
                        description: String::new(),
                        cpid: None,
                    },
                )
            })
            .collect();
        Self {
            state: Mutex::new(TokenState {
                available,
                assigned: BTreeMap::new(),
            }),
            path: None,
        }
    }

    /// Build from `[[token]]` tables, loading saved assignments from `path`.
    ///
    /// A missing or empty file means nothing is assigned yet. Assigned tokens
    /// are removed from the available pool.
    pub fn open(tokens: &[TokenConfig], path: Option<PathBuf>) -> Result<Self> {
        let mut available: BTreeMap<String, TokenRecord> = tokens
            .iter()
            .map(|t| {
                (
                    t.token_id.clone(),
                    TokenRecord {
                        token_id: t.token_id.clone(),
                        description: t.description.clone(),
                        cpid: None,
                    },
                )
            })
            .collect();

        let assigned = match &path {
            Some(p) => load_assignments(p)?,
            None => BTreeMap::new(),
        };
        for token in assigned.values().flatten() {
            available.remove(&token.token_id);
        }
        info!(
            available = available.len(),
            holders = assigned.len(),
            "opened token registry"
        );

        Ok(Self {
            state: Mutex::new(TokenState {
                available,
                assigned,
            }),
            path,
        })
    }

    async fn save(&self, state: &TokenState) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&state.assigned)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| TokenError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

fn load_assignments(path: &Path) -> Result<BTreeMap<String, Vec<TokenRecord>>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[async_trait]
impl TokenRegistry for MemoryTokenRegistry {
    async fn is_registered(&self, token_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.available.contains_key(token_id)
            || state
                .assigned
                .values()
                .flatten()
                .any(|t| t.token_id == token_id))
    }

    async fn is_available(&self, token_id: &str) -> Result<bool> {
        Ok(self.state.lock().await.available.contains_key(token_id))
    }

    async fn assign(&self, actor: &str, token_id: &str, cpid: Cpid) -> Result<()> {
        let mut state = self.state.lock().await;
        let removed = state.available.remove(token_id);
        let mut token = match removed {
            Some(token) => token,
            None if state.assigned.values().flatten().any(|t| t.token_id == token_id) => {
                return Err(TokenError::AlreadyAssigned(token_id.to_string()))
            }
            None => return Err(TokenError::UnknownToken(token_id.to_string())),
        };
        token.cpid = Some(cpid);
        state.give(actor, token);
        debug!(actor, token_id, %cpid, "assigned token");
        self.save(&state).await
    }

    async fn reassign(&self, from: &str, to: &str, token_id: &str, cpid: Cpid) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut token = state.take_held(from, token_id)?;
        token.cpid = Some(cpid);
        state.give(to, token);
        debug!(from, to, token_id, %cpid, "reassigned token");
        self.save(&state).await
    }

    async fn owned_by(&self, actor: &str, token_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .assigned
            .get(actor)
            .is_some_and(|held| held.iter().any(|t| t.token_id == token_id)))
    }

    async fn tokens_of(&self, actor: &str) -> Result<Vec<TokenRecord>> {
        let state = self.state.lock().await;
        Ok(state.assigned.get(actor).cloned().unwrap_or_default())
    }

    async fn return_to_pool(&self, actor: &str, token_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut token = state.take_held(actor, token_id)?;
        token.cpid = None;
        state.available.insert(token.token_id.clone(), token);
        debug!(actor, token_id, "returned token to pool");
        self.save(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpid(b: u8) -> Cpid {
        Cpid::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_assign_lifecycle() {
        let registry = MemoryTokenRegistry::new(["tok-1", "tok-2"]);
        assert!(registry.is_registered("tok-1").await.unwrap());
        assert!(registry.is_available("tok-1").await.unwrap());
        assert!(!registry.is_registered("tok-9").await.unwrap());

        registry.assign("alice", "tok-1", cpid(1)).await.unwrap();
        assert!(registry.is_registered("tok-1").await.unwrap());
        assert!(!registry.is_available("tok-1").await.unwrap());
        assert!(registry.owned_by("alice", "tok-1").await.unwrap());

        assert!(matches!(
            registry.assign("bob", "tok-1", cpid(2)).await,
            Err(TokenError::AlreadyAssigned(_))
        ));
        assert!(matches!(
            registry.assign("bob", "tok-9", cpid(2)).await,
            Err(TokenError::UnknownToken(_))
        ));
    }

    #[tokio::test]
    async fn test_reassign_rebinds_cpid() {
        let registry = MemoryTokenRegistry::new(["tok-1"]);
        registry.assign("alice", "tok-1", cpid(1)).await.unwrap();
        registry.reassign("alice", "bob", "tok-1", cpid(2)).await.unwrap();

        assert!(!registry.owned_by("alice", "tok-1").await.unwrap());
        let held = registry.tokens_of("bob").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].cpid, Some(cpid(2)));

        assert!(matches!(
            registry.reassign("alice", "ted", "tok-1", cpid(3)).await,
            Err(TokenError::NotHeld { .. })
        ));
    }

    #[tokio::test]
    async fn test_return_to_pool() {
        let registry = MemoryTokenRegistry::new(["tok-1"]);
        registry.assign("alice", "tok-1", cpid(1)).await.unwrap();
        registry.return_to_pool("alice", "tok-1").await.unwrap();
        assert!(registry.is_available("tok-1").await.unwrap());
        assert!(registry.tokens_of("alice").await.unwrap().is_empty());
        assert!(registry.return_to_pool("alice", "tok-1").await.is_err());
    }

    #[tokio::test]
    async fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let tokens = vec![
            TokenConfig {
                token_id: "tok-1".into(),
                description: "first".into(),
            },
            TokenConfig {
                token_id: "tok-2".into(),
                description: "second".into(),
            },
        ];

        {
            let registry = MemoryTokenRegistry::open(&tokens, Some(path.clone())).unwrap();
            registry.assign("alice", "tok-1", cpid(1)).await.unwrap();
        }

        let registry = MemoryTokenRegistry::open(&tokens, Some(path)).unwrap();
        assert!(!registry.is_available("tok-1").await.unwrap());
        assert!(registry.is_available("tok-2").await.unwrap());
        let held = registry.tokens_of("alice").await.unwrap();
        assert_eq!(held[0].description, "first");
        assert_eq!(held[0].cpid, Some(cpid(1)));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            MemoryTokenRegistry::open(&[], Some(dir.path().join("absent.json"))).unwrap();
        assert!(registry.tokens_of("alice").await.unwrap().is_empty());
    }
}
