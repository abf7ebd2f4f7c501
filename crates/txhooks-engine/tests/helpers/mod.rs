//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use txhooks_core::config::hooks::HookConfig;
use txhooks_core::error::AppError;
use txhooks_core::result::AppResult;
use txhooks_core::traits::Transaction;
use txhooks_core::types::{SubscriberMode, TransactionId};
use txhooks_engine::{
    FnExecutor, QueuedSubscriber, SubscriberOptions, SubscriberRegistry, TransactionBoundary,
};

/// Ordered record of every observable side effect.
#[derive(Debug, Clone, Default)]
pub struct EffectLog(Arc<Mutex<Vec<String>>>);

impl EffectLog {
    /// Appends an effect.
    pub fn record(&self, effect: impl Into<String>) {
        self.0.lock().expect("effect log poisoned").push(effect.into());
    }

    /// Returns a copy of every effect so far.
    pub fn effects(&self) -> Vec<String> {
        self.0.lock().expect("effect log poisoned").clone()
    }
}

/// Host transaction recording its own commit/abort effects.
#[derive(Debug)]
pub struct RecordingHost {
    pub id: TransactionId,
    pub log: EffectLog,
}

#[async_trait]
impl Transaction for RecordingHost {
    fn id(&self) -> TransactionId {
        self.id
    }

    async fn commit(&self, subtransaction: bool) -> AppResult<()> {
        if subtransaction {
            self.log.record("host-subcommit");
        } else {
            self.log.record("host-commit");
        }
        Ok(())
    }

    async fn abort(&self, subtransaction: bool) -> AppResult<()> {
        if subtransaction {
            self.log.record("host-subabort");
        } else {
            self.log.record("host-abort");
        }
        Ok(())
    }
}

pub type RecordingSubscriber = QueuedSubscriber<FnExecutor<String, ()>>;

/// Registry, hooked host and effect log wired together.
pub struct TestHarness {
    pub registry: Arc<SubscriberRegistry>,
    pub boundary: Arc<TransactionBoundary>,
    pub log: EffectLog,
}

impl TestHarness {
    /// Creates a harness with an empty registry.
    pub fn new() -> Self {
        let log = EffectLog::default();
        let registry = Arc::new(SubscriberRegistry::new());
        let host = Arc::new(RecordingHost {
            id: TransactionId::new(),
            log: log.clone(),
        });
        let boundary = TransactionBoundary::from_config(host, registry.clone(), &HookConfig::default())
            .expect("fresh host is not hooked");

        Self {
            registry,
            boundary: Arc::new(boundary),
            log,
        }
    }

    /// Registers a subscriber whose items record themselves in the effect log.
    ///
    /// Items named `"fail"` return an error instead, and items named
    /// `"panic"` panic.
    pub async fn subscriber(
        &self,
        name: &str,
        priority: i32,
        mode: SubscriberMode,
    ) -> Arc<RecordingSubscriber> {
        let log = self.log.clone();
        let executor = FnExecutor::from_fn(move |item: String| {
            if item == "fail" {
                return Err(AppError::internal("item refused"));
            }
            if item == "panic" {
                panic!("item exploded");
            }
            log.record(item);
            Ok(())
        });

        QueuedSubscriber::register(
            &self.registry,
            executor,
            SubscriberOptions::new(name)
                .with_priority(priority)
                .with_mode(mode),
        )
        .await
        .expect("register subscriber")
    }
}
