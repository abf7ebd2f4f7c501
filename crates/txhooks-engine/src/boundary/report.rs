//! Outcome of one subscriber fan-out.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use txhooks_core::types::TransactionId;

/// Which lifecycle method a fan-out invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// `Subscriber::commit`.
    Commit,
    /// `Subscriber::abort`.
    Abort,
}

impl DispatchPhase {
    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber callback that failed during fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct HookFailure {
    /// Name of the failing subscriber.
    pub subscriber: String,
    /// Error message, or the panic message.
    pub message: String,
    /// Whether the callback panicked rather than returning an error.
    pub panicked: bool,
}

/// Aggregated result of dispatching one phase to all enabled subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Phase that was dispatched.
    pub phase: DispatchPhase,
    /// Transaction the fan-out ran for.
    pub transaction_id: TransactionId,
    /// Subscribers invoked, in dispatch order.
    pub visited: Vec<String>,
    /// Callbacks that returned an error or panicked.
    pub failures: Vec<HookFailure>,
    /// When the fan-out started.
    pub started_at: DateTime<Utc>,
}

impl DispatchReport {
    /// Creates an empty report for a fan-out starting now.
    pub fn new(phase: DispatchPhase, transaction_id: TransactionId) -> Self {
        Self {
            phase,
            transaction_id,
            visited: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns `true` if no subscriber failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` if the fan-out found no enabled subscriber.
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
