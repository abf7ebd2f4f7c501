//! Subscriber contract and its building blocks.

pub mod executor;
pub mod options;
pub mod queue;
pub mod queued;

use async_trait::async_trait;

use txhooks_core::result::AppResult;
use txhooks_core::traits::Transaction;

/// A participant notified at the boundary of a top-level transaction.
///
/// The boundary calls [`commit`](Subscriber::commit) before the host commits
/// and [`abort`](Subscriber::abort) before the host aborts. Both are expected
/// never to fail; an `Err` (or a panic) is logged by the boundary and does
/// not stop the fan-out or the host transaction.
///
/// Identity is the allocation behind the `Arc` the subscriber is registered
/// with. Subscribers do not know their own priority.
///
/// Pushing work is not part of this trait: the item type belongs to each
/// implementation, so `push` is defined by the concrete type (see
/// [`QueuedSubscriber::push`](queued::QueuedSubscriber::push)). Registration
/// goes through [`SubscriberRegistry::add`](crate::registry::SubscriberRegistry::add)
/// or a constructor such as
/// [`QueuedSubscriber::register`](queued::QueuedSubscriber::register).
#[async_trait]
pub trait Subscriber: Send + Sync + std::fmt::Debug {
    /// Name used in log fields and dispatch reports.
    fn name(&self) -> &str;

    /// Whether the boundary should invoke this subscriber.
    fn is_enabled(&self) -> bool;

    /// Toggles participation in dispatch without unregistering.
    fn set_enabled(&self, enabled: bool);

    /// Flushes pending work for the committing transaction.
    async fn commit(&self, transaction: &dyn Transaction) -> AppResult<()>;

    /// Discards pending work for the aborting transaction.
    async fn abort(&self, transaction: &dyn Transaction) -> AppResult<()>;
}

/// Address of the subscriber object, used as its identity.
pub(crate) fn identity(subscriber: &dyn Subscriber) -> *const () {
    std::ptr::from_ref(subscriber).cast::<()>()
}
