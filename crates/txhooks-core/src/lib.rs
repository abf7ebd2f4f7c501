//! # txhooks-core
//!
//! Core crate for txhooks. Contains the unified error system, configuration
//! schemas, typed identifiers and the [`Transaction`](traits::transaction::Transaction)
//! contract a host transaction implements so the commit-hook engine can
//! wrap it.
//!
//! This crate has **no** internal dependencies on other txhooks crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
