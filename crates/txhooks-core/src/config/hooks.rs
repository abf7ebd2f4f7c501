//! Commit-hook engine configuration.

use serde::{Deserialize, Serialize};

use crate::types::SubscriberMode;

/// Defaults applied to subscribers and to the transaction boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Mode used when a subscriber is created without an explicit mode.
    #[serde(default)]
    pub default_mode: SubscriberMode,
    /// Priority used when a subscriber is created without an explicit one.
    #[serde(default)]
    pub default_priority: i32,
    /// Whether panics raised by subscriber callbacks are caught during fan-out.
    #[serde(default = "default_true")]
    pub catch_panics: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            default_mode: SubscriberMode::default(),
            default_priority: 0,
            catch_panics: true,
        }
    }
}

fn default_true() -> bool {
    true
}
