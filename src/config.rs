//! Engine configuration with defaults, TOML loading and environment
//! variable overrides.

use crate::errors::{EngineError, EngineResult};
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Tunables for the round engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum wagers settled concurrently per round.
    pub settlement_concurrency: usize,
    /// Opening balance for newly seeded accounts in the reference ledger.
    pub opening_balance: Amount,
    /// Timeout applied to persistence/ledger I/O by embedding callers.
    pub io_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_concurrency: 16,
            opening_balance: 1_000,
            io_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::PersistenceUnavailable(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| {
            EngineError::PersistenceUnavailable(format!("failed to parse config TOML: {}", e))
        })?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for embedders without a file.
    pub fn from_env() -> EngineResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("CROUPIER_SETTLEMENT_CONCURRENCY") {
            if let Ok(parsed) = value.parse() {
                self.settlement_concurrency = parsed;
            }
        }
        if let Ok(value) = env::var("CROUPIER_OPENING_BALANCE") {
            if let Ok(parsed) = value.parse() {
                self.opening_balance = parsed;
            }
        }
        if let Ok(value) = env::var("CROUPIER_IO_TIMEOUT_MS") {
            if let Ok(parsed) = value.parse() {
                self.io_timeout_ms = parsed;
            }
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.settlement_concurrency == 0 {
            return Err(EngineError::ValidationRejected(
                "settlement_concurrency must be at least 1".to_string(),
            ));
        }
        if self.io_timeout_ms == 0 {
            return Err(EngineError::ValidationRejected(
                "io_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
