//! TOML configuration.
//!
//! The file is parsed into [`EngineConfig`] as-is; actor keys are decoded and
//! validated separately when the [`ActorRegistry`](crate::ActorRegistry) is
//! built from it.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use commitment_backend::{FundingService, UtxoBackend, UtxoNode};
use commitment_core::{Network, SignatureScheme};
use commitment_store::{FileLedger, Ledger, MemoryLedger, SqliteLedger};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default value locked into a freshly minted UTXO anchor.
pub const DEFAULT_ANCHOR_VALUE: u64 = 100;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Networks the engine accepts requests for.
    pub networks: Vec<Network>,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, rename = "actor")]
    pub actors: Vec<ActorConfig>,

    #[serde(default)]
    pub token_store: TokenStoreConfig,

    #[serde(default, rename = "token")]
    pub tokens: Vec<TokenConfig>,
}

impl EngineConfig {
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let config_string = read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_str(&config_string)
    }
}

impl FromStr for EngineConfig {
    type Err = EngineError;

    fn from_str(config_string: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(config_string).map_err(|e| EngineError::Config(e.to_string()))?;
        if config.networks.is_empty() {
            return Err(EngineError::Config("no networks enabled".into()));
        }
        Ok(config)
    }
}

/// Which ledger implementation to open.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    #[default]
    Memory,
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    #[serde(default)]
    pub kind: LedgerKind,
    pub path: Option<PathBuf>,
}

impl LedgerConfig {
    /// Open the configured ledger.
    pub fn open(&self) -> Result<Arc<dyn Ledger>> {
        let path = || {
            self.path
                .as_ref()
                .ok_or_else(|| EngineError::Config("ledger path is required".into()))
        };
        let ledger: Arc<dyn Ledger> = match self.kind {
            LedgerKind::Memory => Arc::new(MemoryLedger::new()),
            LedgerKind::Json => Arc::new(FileLedger::open(path()?)?),
            LedgerKind::Sqlite => Arc::new(SqliteLedger::open(path()?)?),
        };
        Ok(ledger)
    }
}

/// Protocol knobs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Ask the backend whether the source anchor is still unspent before
    /// proposing a transfer.
    #[serde(default)]
    pub check_anchor_status: bool,

    /// Value requested from the funding service per anchor.
    #[serde(default = "default_anchor_value")]
    pub anchor_value: u64,
}

impl EngineSettings {
    /// A UTXO backend over `funder` and `node` that locks `anchor_value`
    /// into each anchor.
    pub fn utxo_backend(
        &self,
        funder: Arc<dyn FundingService>,
        node: Arc<dyn UtxoNode>,
    ) -> UtxoBackend {
        UtxoBackend::new(funder, node).with_anchor_value(self.anchor_value)
    }
}

fn default_anchor_value() -> u64 {
    DEFAULT_ANCHOR_VALUE
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_anchor_status: false,
            anchor_value: DEFAULT_ANCHOR_VALUE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// One `[[actor]]` table. Secrets are hex.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ActorConfig {
    pub name: String,
    pub token_key: String,
    pub token_key_curve: SignatureScheme,
    pub utxo_key: Option<String>,
    pub account_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenStoreConfig {
    /// Where assignments are persisted. In memory only when unset.
    pub path: Option<PathBuf>,
}

/// One `[[token]]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    pub token_id: String,
    #[serde(default)]
    pub description: String,
}
