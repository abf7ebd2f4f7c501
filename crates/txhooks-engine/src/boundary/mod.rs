//! Transaction boundary. Interposes subscriber fan-out on a host
//! transaction's top-level commit and abort.
//!
//! For a top-level `commit(false)`:
//! - Enabled subscribers are snapshotted from the registry.
//! - Each one's `commit` runs in dispatch order, before the host commits.
//! - Failures (errors or panics) are logged and recorded, never returned.
//! - The host commit always runs afterwards; its result is returned.
//!
//! `abort(false)` is symmetric. Sub-transaction calls go straight to the host.

pub mod report;
pub mod state;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use txhooks_core::config::hooks::HookConfig;
use txhooks_core::error::AppError;
use txhooks_core::result::AppResult;
use txhooks_core::traits::Transaction;
use txhooks_core::types::TransactionId;

use self::report::{DispatchPhase, DispatchReport, HookFailure};
use self::state::TransactionState;
use crate::registry::SubscriberRegistry;

/// Wraps a host [`Transaction`] so top-level commit/abort notify every
/// enabled subscriber first.
#[derive(Debug)]
pub struct TransactionBoundary {
    /// The wrapped host transaction.
    inner: Arc<dyn Transaction>,
    /// Registry consulted at each top-level commit/abort.
    registry: Arc<SubscriberRegistry>,
    /// Whether subscriber panics are caught.
    catch_panics: bool,
    /// Current cycle state.
    state: Mutex<TransactionState>,
    /// Report of the most recent fan-out.
    last_report: Mutex<Option<DispatchReport>>,
}

/// Returns the boundary to `Open` if a cycle is abandoned mid-way
/// (host panic or dropped future).
struct CycleGuard<'a> {
    state: &'a Mutex<TransactionState>,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, next: TransactionState) {
        *lock(self.state) = next;
        self.settled = true;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *lock(self.state) = TransactionState::Open;
        }
    }
}

impl TransactionBoundary {
    /// Wraps `inner` with subscriber fan-out.
    ///
    /// Fails with `InvalidState` if `inner` is already hooked; use
    /// [`install`](Self::install) for an idempotent variant.
    pub fn new(inner: Arc<dyn Transaction>, registry: Arc<SubscriberRegistry>) -> AppResult<Self> {
        if inner.is_hooked() {
            return Err(AppError::invalid_state(format!(
                "Transaction {} already has commit hooks installed",
                inner.id()
            )));
        }

        Ok(Self {
            inner,
            registry,
            catch_panics: true,
            state: Mutex::new(TransactionState::Open),
            last_report: Mutex::new(None),
        })
    }

    /// Wraps `inner` using the configured boundary settings.
    pub fn from_config(
        inner: Arc<dyn Transaction>,
        registry: Arc<SubscriberRegistry>,
        config: &HookConfig,
    ) -> AppResult<Self> {
        Ok(Self::new(inner, registry)?.with_catch_panics(config.catch_panics))
    }

    /// Sets whether subscriber panics are caught during fan-out.
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Installs commit hooks on `inner`.
    ///
    /// Installing on a transaction that is already hooked returns it
    /// unchanged, so repeated initialization never stacks wrappers.
    pub fn install(
        inner: Arc<dyn Transaction>,
        registry: Arc<SubscriberRegistry>,
        config: &HookConfig,
    ) -> Arc<dyn Transaction> {
        if inner.is_hooked() {
            debug!(transaction_id = %inner.id(), "Commit hooks already installed");
            return inner;
        }

        info!(transaction_id = %inner.id(), "Installing commit hooks");
        Arc::new(Self {
            inner,
            registry,
            catch_panics: config.catch_panics,
            state: Mutex::new(TransactionState::Open),
            last_report: Mutex::new(None),
        })
    }

    /// Returns the current cycle state.
    pub fn state(&self) -> TransactionState {
        *lock(&self.state)
    }

    /// Reopens the transaction for a new cycle.
    ///
    /// Fails with `InvalidState` while a fan-out is running.
    pub fn begin(&self) -> AppResult<()> {
        let mut state = lock(&self.state);
        if state.is_transient() {
            return Err(AppError::invalid_state(format!(
                "Cannot begin a new cycle while {}",
                *state
            )));
        }
        *state = TransactionState::Open;
        Ok(())
    }

    /// Returns the report of the most recent top-level fan-out.
    pub fn last_report(&self) -> Option<DispatchReport> {
        lock(&self.last_report).clone()
    }

    /// Returns the wrapped host transaction.
    pub fn inner(&self) -> &Arc<dyn Transaction> {
        &self.inner
    }

    /// Returns the subscriber registry.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Moves into a transient state, rejecting re-entry from inside a fan-out.
    fn enter(&self, next: TransactionState) -> AppResult<CycleGuard<'_>> {
        let mut state = lock(&self.state);
        if state.is_transient() {
            return Err(AppError::invalid_state(format!(
                "Transaction {} is already {}; nested top-level {} rejected",
                self.inner.id(),
                *state,
                next
            )));
        }
        *state = next;

        Ok(CycleGuard {
            state: &self.state,
            settled: false,
        })
    }

    /// Invokes `phase` on every enabled subscriber in dispatch order.
    async fn fan_out(&self, phase: DispatchPhase) -> DispatchReport {
        let transaction = self.inner.as_ref();
        let mut report = DispatchReport::new(phase, transaction.id());
        let subscribers = self.registry.list_enabled().await;

        if subscribers.is_empty() {
            debug!(
                transaction_id = %report.transaction_id,
                phase = %phase,
                "No enabled subscribers, skipping fan-out"
            );
            *lock(&self.last_report) = Some(report.clone());
            return report;
        }

        debug!(
            transaction_id = %report.transaction_id,
            phase = %phase,
            subscriber_count = subscribers.len(),
            "Dispatching to subscribers"
        );

        for subscriber in &subscribers {
            report.visited.push(subscriber.name().to_string());

            let call = async {
                match phase {
                    DispatchPhase::Commit => subscriber.commit(transaction).await,
                    DispatchPhase::Abort => subscriber.abort(transaction).await,
                }
            };

            let outcome = if self.catch_panics {
                AssertUnwindSafe(call).catch_unwind().await
            } else {
                Ok(call.await)
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        transaction_id = %report.transaction_id,
                        phase = %phase,
                        subscriber = %subscriber.name(),
                        error = %e,
                        "Subscriber failed, continuing"
                    );
                    report.failures.push(HookFailure {
                        subscriber: subscriber.name().to_string(),
                        message: e.to_string(),
                        panicked: false,
                    });
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        transaction_id = %report.transaction_id,
                        phase = %phase,
                        subscriber = %subscriber.name(),
                        panic = %message,
                        "Subscriber panicked, continuing"
                    );
                    report.failures.push(HookFailure {
                        subscriber: subscriber.name().to_string(),
                        message,
                        panicked: true,
                    });
                }
            }
        }

        if !report.is_clean() {
            warn!(
                transaction_id = %report.transaction_id,
                phase = %phase,
                failures = report.failures.len(),
                "Fan-out completed with failures"
            );
        }

        *lock(&self.last_report) = Some(report.clone());
        report
    }
}

#[async_trait]
impl Transaction for TransactionBoundary {
    fn id(&self) -> TransactionId {
        self.inner.id()
    }

    async fn commit(&self, subtransaction: bool) -> AppResult<()> {
        if subtransaction {
            debug!(transaction_id = %self.id(), "Sub-transaction commit, hooks not fired");
            return self.inner.commit(true).await;
        }

        let cycle = self.enter(TransactionState::Committing)?;
        self.fan_out(DispatchPhase::Commit).await;

        let result = self.inner.commit(false).await;
        match &result {
            Ok(()) => cycle.settle(TransactionState::Committed),
            Err(e) => {
                warn!(transaction_id = %self.id(), error = %e, "Host commit failed");
                cycle.settle(TransactionState::Open);
            }
        }
        result
    }

    async fn abort(&self, subtransaction: bool) -> AppResult<()> {
        if subtransaction {
            debug!(transaction_id = %self.id(), "Sub-transaction abort, hooks not fired");
            return self.inner.abort(true).await;
        }

        let cycle = self.enter(TransactionState::Aborting)?;
        self.fan_out(DispatchPhase::Abort).await;

        let result = self.inner.abort(false).await;
        match &result {
            Ok(()) => cycle.settle(TransactionState::Aborted),
            Err(e) => {
                warn!(transaction_id = %self.id(), error = %e, "Host abort failed");
                cycle.settle(TransactionState::Open);
            }
        }
        result
    }

    fn is_hooked(&self) -> bool {
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
