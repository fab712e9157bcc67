//! TOML configuration for the certification service.

use crate::certifier::CertificationService;
use crate::error::CertError;
use crate::keys::KeyPair;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use wipecert_anchor::{AnchorError, AnchorGateway, BoundedGateway, HttpLedger, MemoryLedger};
use wipecert_core::CanonicalMode;
use wipecert_storage::{IndexError, IndexStore, MemoryIndex, RedbIndex};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid TOML: {0}")]
    Parse(String),

    /// A value is out of range or inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Key material failed to load
    #[error(transparent)]
    Keys(#[from] CertError),

    /// Ledger client could not be built
    #[error("ledger: {0}")]
    Ledger(#[from] AnchorError),

    /// Index could not be opened
    #[error("index: {0}")]
    Index(#[from] IndexError),
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Signing keypair
    pub keys: KeysConfig,
    /// Ledger backend
    pub ledger: LedgerConfig,
    /// Local index
    pub index: IndexConfig,
    /// Canonicalization
    pub canonical: CanonicalConfig,
    /// External wipe executable
    pub wipe: WipeConfig,
    /// Stats aggregation
    pub stats: StatsConfig,
}

/// Key file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysConfig {
    /// PEM private key (PKCS#8 or PKCS#1)
    pub private_key_path: PathBuf,
    /// PEM public key; derived from the private key when absent
    pub public_key_path: Option<PathBuf>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("keys/private.pem"),
            public_key_path: None,
        }
    }
}

/// Which ledger implementation to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// In-process registry; records are lost on restart
    #[default]
    Memory,
    /// Remote JSON gateway
    Http,
}

/// Ledger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Backend kind
    pub backend: LedgerBackend,
    /// Gateway base URL (http backend)
    pub url: Option<String>,
    /// Issuer identity recorded by the memory backend
    pub issuer: String,
    /// Deadline for `submit`, which waits for confirmation
    pub submit_timeout_ms: u64,
    /// Deadline for `query` and `read`
    pub query_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            url: None,
            issuer: "wipecert".to_string(),
            submit_timeout_ms: 30_000,
            query_timeout_ms: 10_000,
        }
    }
}

/// Index settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// redb file; in-memory index when absent
    pub path: Option<PathBuf>,
}

/// Canonicalization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanonicalConfig {
    /// Key ordering policy
    pub mode: CanonicalMode,
}

/// Wipe execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WipeConfig {
    /// Executable invoked as `<exe> --path <path> --method <method>`
    pub executable: Option<PathBuf>,
    /// Hard limit before the child is killed
    pub timeout_secs: u64,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            timeout_secs: 600,
        }
    }
}

/// Stats settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    /// Ledger reads in flight during aggregation
    pub concurrency: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl ServiceConfig {
    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or fails validation
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Check value ranges and cross-field requirements
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.backend == LedgerBackend::Http
            && self.ledger.url.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "ledger.url is required for the http backend".into(),
            ));
        }
        if self.ledger.submit_timeout_ms == 0 || self.ledger.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ledger timeouts must be greater than 0".into(),
            ));
        }
        if self.ledger.issuer.is_empty() {
            return Err(ConfigError::Invalid("ledger.issuer must not be empty".into()));
        }
        if self.stats.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "stats.concurrency must be greater than 0".into(),
            ));
        }
        if self.wipe.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "wipe.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Load the signing keypair
    ///
    /// # Errors
    ///
    /// Returns [`CertError::KeyUnavailable`] if the keys cannot be loaded
    pub fn open_keys(&self) -> Result<KeyPair, CertError> {
        Ok(KeyPair::load(
            &self.keys.private_key_path,
            self.keys.public_key_path.as_deref(),
        )?)
    }

    /// Build the configured ledger with deadlines applied
    ///
    /// # Errors
    ///
    /// Returns error if the gateway URL is invalid
    pub fn open_ledger(&self) -> Result<Arc<dyn AnchorGateway>, ConfigError> {
        let inner: Arc<dyn AnchorGateway> = match self.ledger.backend {
            LedgerBackend::Memory => Arc::new(MemoryLedger::new(self.ledger.issuer.clone())),
            LedgerBackend::Http => {
                let url = self.ledger.url.as_deref().unwrap_or_default();
                Arc::new(HttpLedger::new(url)?)
            }
        };
        Ok(Arc::new(
            BoundedGateway::new(inner)
                .with_submit_timeout(Duration::from_millis(self.ledger.submit_timeout_ms))
                .with_query_timeout(Duration::from_millis(self.ledger.query_timeout_ms)),
        ))
    }

    /// Open the configured index
    ///
    /// # Errors
    ///
    /// Returns error if the index file cannot be opened
    pub fn open_index(&self) -> Result<Arc<dyn IndexStore>, ConfigError> {
        Ok(match &self.index.path {
            Some(path) => Arc::new(RedbIndex::open(path)?),
            None => Arc::new(MemoryIndex::new()),
        })
    }

    /// Assemble the certification service
    ///
    /// # Errors
    ///
    /// Returns error if keys, ledger or index cannot be opened
    pub fn build_service(&self) -> Result<CertificationService, ConfigError> {
        let keys = Arc::new(self.open_keys()?);
        let service = CertificationService::new(self.open_ledger()?, self.open_index()?, keys)
            .with_canonical_mode(self.canonical.mode)
            .with_stats_concurrency(self.stats.concurrency);
        Ok(service)
    }
}
