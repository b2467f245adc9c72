//! Gate configuration.
//!
//! Timeouts are grouped by operation class so a stalled background rebuild
//! cannot hold up key processing forever. A limit covers both waiting for
//! the gate and running the operation once acquired.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gate::OperationClass;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Limit applied to every operation class without its own override.
    /// `None` means operations may hold the gate indefinitely.
    pub operation_timeout_ms: Option<u64>,

    /// Override for session calls (key processing, snapshots).
    pub interactive_timeout_ms: Option<u64>,

    /// Override for manager calls (initialize, rebuild, maintenance,
    /// schema listing, teardown).
    pub background_timeout_ms: Option<u64>,
}

impl GateConfig {
    /// Same limit for every class.
    pub fn with_operation_timeout(ms: u64) -> Self {
        Self {
            operation_timeout_ms: Some(ms),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config: GateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Effective limit for an operation class.
    pub fn timeout_for(&self, class: OperationClass) -> Option<Duration> {
        let per_class = match class {
            OperationClass::Interactive => self.interactive_timeout_ms,
            OperationClass::Background => self.background_timeout_ms,
        };
        per_class
            .or(self.operation_timeout_ms)
            .map(Duration::from_millis)
    }
}
