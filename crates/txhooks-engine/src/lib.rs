//! # txhooks-engine
//!
//! Commit-hook coordination for an externally driven transaction. Provides:
//!
//! - [`Subscriber`] contract and the [`QueuedSubscriber`] implementation with
//!   synchronous and queued modes
//! - Per-subscriber FIFO [`WorkQueue`] flushed on commit, discarded on abort
//! - [`SubscriberRegistry`] with priority plus insertion-order dispatch
//! - [`TransactionBoundary`] wrapping a host [`Transaction`](txhooks_core::traits::Transaction)
//!   so that top-level commit/abort fan out to enabled subscribers first

pub mod boundary;
pub mod prelude;
pub mod registry;
pub mod subscriber;

pub use boundary::report::{DispatchPhase, DispatchReport, HookFailure};
pub use boundary::state::TransactionState;
pub use boundary::TransactionBoundary;
pub use registry::{EntryInfo, SubscriberRegistry};
pub use subscriber::executor::{FnExecutor, ItemExecutor};
pub use subscriber::options::SubscriberOptions;
pub use subscriber::queue::WorkQueue;
pub use subscriber::queued::QueuedSubscriber;
pub use subscriber::Subscriber;
