//! Core traits defined in `txhooks-core` and implemented by other crates.

pub mod transaction;

pub use transaction::Transaction;
