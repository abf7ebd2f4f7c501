//! Construction options for subscribers.

use serde::{Deserialize, Serialize};

use txhooks_core::config::hooks::HookConfig;
use txhooks_core::types::SubscriberMode;

/// Name, priority, initial mode and enabled flag for a new subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberOptions {
    /// Name used in logs and dispatch reports.
    pub name: String,
    /// Dispatch priority (lower = runs first).
    pub priority: i32,
    /// Initial mode.
    pub mode: SubscriberMode,
    /// Whether the subscriber starts enabled.
    pub enabled: bool,
}

impl SubscriberOptions {
    /// Options with priority 0, queued mode, enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            mode: SubscriberMode::default(),
            enabled: true,
        }
    }

    /// Options seeded from the configured defaults.
    pub fn from_config(name: impl Into<String>, config: &HookConfig) -> Self {
        Self {
            name: name.into(),
            priority: config.default_priority,
            mode: config.default_mode,
            enabled: true,
        }
    }

    /// Sets the dispatch priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the initial mode.
    pub fn with_mode(mut self, mode: SubscriberMode) -> Self {
        self.mode = mode;
        self
    }

    /// Starts the subscriber disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
