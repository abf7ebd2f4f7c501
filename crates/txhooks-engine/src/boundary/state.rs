//! Per-cycle state of a hooked transaction.

use std::fmt;

use serde::Serialize;

/// Where a hooked transaction is in its current top-level cycle.
///
/// `Committing` and `Aborting` are transient: they last exactly as long as
/// the subscriber fan-out plus the delegated host call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Accepting work; no top-level commit or abort in progress.
    #[default]
    Open,
    /// Fanning out commit to subscribers, then committing the host.
    Committing,
    /// The last top-level commit succeeded.
    Committed,
    /// Fanning out abort to subscribers, then aborting the host.
    Aborting,
    /// The last top-level abort completed.
    Aborted,
}

impl TransactionState {
    /// Returns `true` while a fan-out is running.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Committing | Self::Aborting)
    }

    /// Returns the string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
