//! Runtime configuration.
//!
//! Every tunable parameter in one place. Read from TOML at startup; defaults
//! apply when no config file is present.

use neuromesh_core::IntentionCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Coordination loop tick interval in milliseconds.
    pub tick_ms: u64,
    /// Execution loop poll interval in milliseconds.
    pub poll_ms: u64,
    /// Topic-discovery interval in seconds (runs inside the coordination
    /// loop, on its own longer cadence).
    pub discovery_secs: u64,
    /// Advisory ceiling on the number of Pending intentions.
    pub pending_ceiling: usize,
    /// Bounded routing-history size on the bus.
    pub history_limit: usize,
    /// Unit mailbox idle interval in milliseconds.
    pub idle_ms: u64,
    /// Approval policy toggles.
    pub approvals: ApprovalConfig,
}

/// Auto-approval policy evaluated each coordination tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Global override: approve every Pending intention unconditionally.
    pub yolo: bool,
    /// Approve intentions with priority at or below Low.
    pub auto_approve_low_risk: bool,
    /// Approve SelfReflection intentions.
    pub auto_approve_self_reflection: bool,
    /// Approve MemoryManagement intentions.
    pub auto_approve_memory: bool,
    /// Categories that always need an explicit operator decision.
    /// The global override still approves these.
    pub always_require: Vec<IntentionCategory>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_ms: 5_000,
            poll_ms: 2_000,
            discovery_secs: 300,
            pending_ceiling: 10,
            history_limit: 200,
            idle_ms: 50,
            approvals: ApprovalConfig::default(),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            yolo: false,
            auto_approve_low_risk: true,
            auto_approve_self_reflection: false,
            auto_approve_memory: false,
            always_require: vec![
                IntentionCategory::CodeModification,
                IntentionCategory::SafetyCheck,
            ],
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl RuntimeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_ms)
    }

    pub fn discovery_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.discovery_secs)
    }

    pub fn idle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.idle_ms)
    }
}
