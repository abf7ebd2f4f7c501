//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use txhooks_core::error::{AppError, ErrorKind};
pub use txhooks_core::result::AppResult;
pub use txhooks_core::traits::Transaction;
pub use txhooks_core::types::{SubscriberMode, TransactionId};

pub use crate::boundary::TransactionBoundary;
pub use crate::registry::SubscriberRegistry;
pub use crate::subscriber::executor::{FnExecutor, ItemExecutor};
pub use crate::subscriber::options::SubscriberOptions;
pub use crate::subscriber::queued::QueuedSubscriber;
pub use crate::subscriber::Subscriber;
