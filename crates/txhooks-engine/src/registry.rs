//! Subscriber registry, ordered by priority with ties broken by registration order.

use std::sync::{Arc, LazyLock};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use txhooks_core::error::AppError;
use txhooks_core::result::AppResult;

use crate::subscriber::{Subscriber, identity};

/// Entry in the subscriber registry.
#[derive(Debug, Clone)]
struct RegistryEntry {
    /// The subscriber.
    subscriber: Arc<dyn Subscriber>,
    /// Priority (lower = earlier dispatch).
    priority: i32,
    /// Registration sequence number, breaks priority ties.
    sequence: u64,
}

impl RegistryEntry {
    fn is(&self, subscriber: &dyn Subscriber) -> bool {
        identity(self.subscriber.as_ref()) == identity(subscriber)
    }
}

/// Read-only view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Subscriber name.
    pub name: String,
    /// Dispatch priority.
    pub priority: i32,
    /// Registration sequence number.
    pub sequence: u64,
    /// Whether the subscriber currently takes part in dispatch.
    pub enabled: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Vec<RegistryEntry>,
    next_sequence: u64,
}

impl RegistryInner {
    fn position(&self, subscriber: &dyn Subscriber) -> Option<usize> {
        self.entries.iter().position(|e| e.is(subscriber))
    }

    /// Entries in dispatch order: priority ascending, then sequence ascending.
    fn sorted(&self) -> Vec<RegistryEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| (e.priority, e.sequence));
        entries
    }
}

static GLOBAL: LazyLock<Arc<SubscriberRegistry>> =
    LazyLock::new(|| Arc::new(SubscriberRegistry::new()));

/// Ordered, mutable collection of subscribers.
///
/// Every read returns a fresh snapshot, so a subscriber may register or
/// unregister others while a dispatch is iterating; the change applies to
/// the next dispatch only.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    inner: RwLock<RegistryInner>,
}

impl SubscriberRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide shared registry.
    ///
    /// Engine code never reaches for this implicitly; it only exists for
    /// hosts that want one registry without threading it through.
    pub fn global() -> Arc<SubscriberRegistry> {
        GLOBAL.clone()
    }

    /// Registers a subscriber at `priority`.
    ///
    /// Fails with `DuplicateSubscriber` if the same object is already
    /// registered.
    pub async fn add(&self, subscriber: Arc<dyn Subscriber>, priority: i32) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        if inner.position(subscriber.as_ref()).is_some() {
            return Err(AppError::duplicate_subscriber(format!(
                "Subscriber '{}' is already registered",
                subscriber.name()
            )));
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        info!(
            subscriber = %subscriber.name(),
            priority,
            sequence,
            "Subscriber registered"
        );

        inner.entries.push(RegistryEntry {
            subscriber,
            priority,
            sequence,
        });

        Ok(())
    }

    /// Unregisters a subscriber.
    ///
    /// Fails with `NotFound` if it is not registered.
    pub async fn remove(&self, subscriber: &dyn Subscriber) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        let index = inner
            .position(subscriber)
            .ok_or_else(|| not_registered(subscriber))?;
        let entry = inner.entries.remove(index);

        info!(
            subscriber = %entry.subscriber.name(),
            priority = entry.priority,
            "Subscriber unregistered"
        );

        Ok(())
    }

    /// Enables a registered subscriber.
    pub async fn enable(&self, subscriber: &dyn Subscriber) -> AppResult<()> {
        self.set_enabled(subscriber, true).await
    }

    /// Disables a registered subscriber without unregistering it.
    pub async fn disable(&self, subscriber: &dyn Subscriber) -> AppResult<()> {
        self.set_enabled(subscriber, false).await
    }

    async fn set_enabled(&self, subscriber: &dyn Subscriber, enabled: bool) -> AppResult<()> {
        let inner = self.inner.read().await;
        let index = inner
            .position(subscriber)
            .ok_or_else(|| not_registered(subscriber))?;

        inner.entries[index].subscriber.set_enabled(enabled);
        debug!(subscriber = %subscriber.name(), enabled, "Subscriber participation changed");
        Ok(())
    }

    /// Returns enabled subscribers in dispatch order.
    ///
    /// The result is a snapshot computed at call time.
    pub async fn list_enabled(&self) -> Vec<Arc<dyn Subscriber>> {
        let inner = self.inner.read().await;
        inner
            .sorted()
            .into_iter()
            .filter(|e| e.subscriber.is_enabled())
            .map(|e| e.subscriber)
            .collect()
    }

    /// Returns every entry, enabled or not, in dispatch order.
    pub async fn entries(&self) -> Vec<EntryInfo> {
        let inner = self.inner.read().await;
        inner
            .sorted()
            .into_iter()
            .map(|e| EntryInfo {
                name: e.subscriber.name().to_string(),
                priority: e.priority,
                sequence: e.sequence,
                enabled: e.subscriber.is_enabled(),
            })
            .collect()
    }

    /// Returns whether at least one registered subscriber is enabled.
    pub async fn has_enabled(&self) -> bool {
        let inner = self.inner.read().await;
        inner.entries.iter().any(|e| e.subscriber.is_enabled())
    }

    /// Checks whether a subscriber is registered.
    pub async fn contains(&self, subscriber: &dyn Subscriber) -> bool {
        let inner = self.inner.read().await;
        inner.position(subscriber).is_some()
    }

    /// Returns the priority a subscriber was registered with.
    pub async fn priority_of(&self, subscriber: &dyn Subscriber) -> Option<i32> {
        let inner = self.inner.read().await;
        inner
            .position(subscriber)
            .map(|index| inner.entries[index].priority)
    }

    /// Returns the number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns whether no subscribers are registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Drops every registration and restarts sequence numbering.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        let dropped = inner.entries.len();
        *inner = RegistryInner::default();

        info!(dropped, "Subscriber registry reset");
    }
}

fn not_registered(subscriber: &dyn Subscriber) -> AppError {
    AppError::not_found(format!(
        "Subscriber '{}' is not registered",
        subscriber.name()
    ))
}
