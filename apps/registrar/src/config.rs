//! # Configuration
//!
//! Optional `registrar.toml`:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100            # requests per second, 0 disables
//! cors_origins = ["http://localhost:3000"]
//!
//! [storage]
//! backend = "redb"            # or "memory"
//! path = "registrar.db"
//!
//! [promotion]
//! target_policy = "always_create"   # or "only_when_students_moved"
//! ```
//!
//! Precedence, lowest first: defaults, file, environment
//! (`REGISTRAR_RATE_LIMIT`, `REGISTRAR_CORS_ORIGINS`), CLI flags.

use registrar_core::{RegistrarError, Registry, TargetEnrollmentPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default requests per second accepted by the HTTP server.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),
}

impl From<ConfigError> for RegistrarError {
    fn from(e: ConfigError) -> Self {
        RegistrarError::IoError(e.to_string())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    /// `None` means localhost only; `["*"]` allows every origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

/// Which store backs the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Redb,
    Memory,
}

impl BackendKind {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("registrar.db"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    pub target_policy: TargetEnrollmentPolicy,
}

// =============================================================================
// ROOT
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub promotion: PromotionConfig,
}

impl RegistrarConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `REGISTRAR_*` environment overrides.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("REGISTRAR_RATE_LIMIT") {
            match raw.trim().parse::<u32>() {
                Ok(rps) => self.server.rate_limit = rps,
                Err(_) => tracing::warn!("Ignoring invalid REGISTRAR_RATE_LIMIT '{}'", raw),
            }
        }
        if let Some(raw) = lookup("REGISTRAR_CORS_ORIGINS") {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.server.cors_origins = Some(origins);
        }
        self
    }

    /// Open the configured registry.
    pub fn open_registry(&self) -> Result<Registry, RegistrarError> {
        let registry = match self.storage.backend {
            BackendKind::Redb => Registry::with_redb(&self.storage.path)?,
            BackendKind::Memory => Registry::new(),
        };
        Ok(registry.with_policy(self.promotion.target_policy))
    }
}

// =============================================================================
// TESTS
// =============================================================================
