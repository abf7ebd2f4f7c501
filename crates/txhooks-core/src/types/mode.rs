//! Subscriber execution mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a subscriber treats pushed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberMode {
    /// Items execute as soon as they are pushed.
    Synchronous,
    /// Items are buffered and executed when the transaction commits.
    #[default]
    Queued,
}

impl SubscriberMode {
    /// Returns the string name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous",
            Self::Queued => "queued",
        }
    }
}

impl fmt::Display for SubscriberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_queued() {
        assert_eq!(SubscriberMode::default(), SubscriberMode::Queued);
    }

    #[test]
    fn test_deserialize_snake_case() {
        let mode: SubscriberMode = serde_json::from_str("\"synchronous\"").unwrap();
        assert_eq!(mode, SubscriberMode::Synchronous);
        assert_eq!(mode.to_string(), "synchronous");
    }
}
