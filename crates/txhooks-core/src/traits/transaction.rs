//! Contract for the host transaction that commit hooks interpose on.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::TransactionId;

/// A host-owned transaction exposing commit and abort entry points.
///
/// The `subtransaction` flag marks a nested or partial commit/abort. Only
/// calls with `subtransaction == false` close a transaction cycle.
///
/// Implementations are expected to be confined to a single thread of
/// control; sharing one transaction between threads is undefined.
#[async_trait]
pub trait Transaction: Send + Sync + std::fmt::Debug + 'static {
    /// Identifier of this transaction, used for logging and reports.
    fn id(&self) -> TransactionId;

    /// Commit the transaction (or a sub-transaction of it).
    async fn commit(&self, subtransaction: bool) -> AppResult<()>;

    /// Abort the transaction (or a sub-transaction of it).
    async fn abort(&self, subtransaction: bool) -> AppResult<()>;

    /// Returns `true` if commit hooks already interpose on this transaction.
    ///
    /// Wrappers return `true` so that installing hooks twice leaves the
    /// first wrapper in place.
    fn is_hooked(&self) -> bool {
        false
    }
}
