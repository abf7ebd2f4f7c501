//! Core type definitions used across the txhooks workspace.

pub mod id;
pub mod mode;

pub use id::*;
pub use mode::SubscriberMode;
