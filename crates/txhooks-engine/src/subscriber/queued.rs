//! Subscriber that either executes pushed items immediately or buffers
//! them until the transaction commits.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use txhooks_core::error::{AppError, ErrorKind};
use txhooks_core::result::AppResult;
use txhooks_core::traits::Transaction;
use txhooks_core::types::SubscriberMode;

use super::Subscriber;
use super::executor::ItemExecutor;
use super::options::SubscriberOptions;
use super::queue::WorkQueue;
use crate::boundary::panic_message;
use crate::registry::SubscriberRegistry;

// Subscribers whose commit is running on the current task.
tokio::task_local! {
    static ACTIVE_DISPATCH: Vec<usize>;
}

/// Mode and pending items, guarded together so a mode switch and a push
/// never observe each other half-way.
struct SubscriberState<T> {
    mode: SubscriberMode,
    queue: WorkQueue<T>,
}

/// A [`Subscriber`] driving an [`ItemExecutor`].
///
/// In [`SubscriberMode::Synchronous`] every [`push`](Self::push) runs the
/// executor right away and returns its output. In [`SubscriberMode::Queued`]
/// pushes are buffered; [`commit`](Subscriber::commit) runs them in FIFO
/// order and [`abort`](Subscriber::abort) drops them.
///
/// Item failures during commit, including panics, are logged and skipped,
/// so one bad item never prevents the rest of the queue from running.
pub struct QueuedSubscriber<E: ItemExecutor> {
    name: String,
    executor: E,
    state: Mutex<SubscriberState<E::Item>>,
    enabled: AtomicBool,
}

impl<E: ItemExecutor> std::fmt::Debug for QueuedSubscriber<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedSubscriber")
            .field("name", &self.name)
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish()
    }
}

impl<E: ItemExecutor> QueuedSubscriber<E> {
    /// Creates an unregistered subscriber.
    pub fn new(executor: E, options: &SubscriberOptions) -> Self {
        Self {
            name: options.name.clone(),
            executor,
            state: Mutex::new(SubscriberState {
                mode: options.mode,
                queue: WorkQueue::new(),
            }),
            enabled: AtomicBool::new(options.enabled),
        }
    }

    /// Creates a subscriber and registers it with `registry` at
    /// `options.priority`.
    pub async fn register(
        registry: &SubscriberRegistry,
        executor: E,
        options: SubscriberOptions,
    ) -> AppResult<Arc<Self>> {
        let subscriber = Arc::new(Self::new(executor, &options));
        registry.add(subscriber.clone(), options.priority).await?;
        Ok(subscriber)
    }

    /// Returns the current mode.
    pub async fn mode(&self) -> SubscriberMode {
        self.state.lock().await.mode
    }

    /// Switches mode.
    ///
    /// Switching to synchronous executes every already queued item once, in
    /// FIFO order, and then executes all further pushes immediately. Every
    /// drained item runs even if an earlier one fails; the first failure is
    /// returned after the switch has taken effect.
    ///
    /// Fails with `InvalidState` when called from inside this subscriber's
    /// own commit or abort. Calls from other tasks are unaffected.
    pub async fn set_mode(&self, mode: SubscriberMode) -> AppResult<()> {
        if self.is_dispatching() {
            return Err(AppError::invalid_state(format!(
                "Cannot change mode of subscriber '{}' during commit/abort dispatch",
                self.name
            )));
        }

        let drained = {
            let mut state = self.state.lock().await;
            if state.mode == mode {
                return Ok(());
            }
            state.mode = mode;
            match mode {
                SubscriberMode::Synchronous => state.queue.drain(),
                SubscriberMode::Queued => Vec::new(),
            }
        };

        info!(
            subscriber = %self.name,
            mode = %mode,
            flushed = drained.len(),
            "Subscriber mode changed"
        );

        let mut first_failure = None;
        for (index, item) in drained.into_iter().enumerate() {
            if let Err(e) = self.run_isolated(item).await {
                error!(
                    subscriber = %self.name,
                    item = index,
                    error = %e,
                    "Queued item failed while switching to synchronous mode"
                );
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pushes an item.
    ///
    /// Synchronous mode executes it now and returns `Some(output)`; a
    /// failure is returned as `HookExecution`. Queued mode buffers it and
    /// returns `None`.
    pub async fn push(&self, item: E::Item) -> AppResult<Option<E::Output>> {
        {
            let mut state = self.state.lock().await;
            if state.mode == SubscriberMode::Queued {
                state.queue.push(item);
                return Ok(None);
            }
        }

        self.run(item).await.map(Some)
    }

    /// Number of items waiting for the next commit.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Enables participation in dispatch.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Disables participation in dispatch.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Runs one item, classifying any failure as `HookExecution`.
    async fn run(&self, item: E::Item) -> AppResult<E::Output> {
        self.executor.execute(item).await.map_err(|e| {
            if e.is(ErrorKind::HookExecution) {
                e
            } else {
                let message = format!("Subscriber '{}' failed to execute item: {}", self.name, e);
                AppError::with_source(ErrorKind::HookExecution, message, e)
            }
        })
    }

    /// Like [`run`](Self::run), but a panicking executor is reported as a
    /// `HookExecution` failure of this item alone.
    async fn run_isolated(&self, item: E::Item) -> AppResult<E::Output> {
        match AssertUnwindSafe(self.run(item)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AppError::hook_execution(format!(
                "Subscriber '{}' panicked while executing item: {}",
                self.name,
                panic_message(panic.as_ref())
            ))),
        }
    }

    fn dispatch_key(&self) -> usize {
        std::ptr::from_ref(self).addr()
    }

    /// Whether the current task is inside this subscriber's commit or abort.
    fn is_dispatching(&self) -> bool {
        let key = self.dispatch_key();
        ACTIVE_DISPATCH
            .try_with(|active| active.contains(&key))
            .unwrap_or(false)
    }

    /// Runs `body` marked as this subscriber's dispatch on the current task.
    async fn dispatch<F: Future>(&self, body: F) -> F::Output {
        let mut active = ACTIVE_DISPATCH
            .try_with(|active| active.clone())
            .unwrap_or_default();
        active.push(self.dispatch_key());
        ACTIVE_DISPATCH.scope(active, body).await
    }
}

#[async_trait]
impl<E: ItemExecutor> Subscriber for QueuedSubscriber<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn commit(&self, transaction: &dyn Transaction) -> AppResult<()> {
        let items = self.state.lock().await.queue.drain();
        if items.is_empty() {
            return Ok(());
        }

        debug!(
            subscriber = %self.name,
            transaction_id = %transaction.id(),
            items = items.len(),
            "Flushing queued items"
        );

        self.dispatch(async {
            for (index, item) in items.into_iter().enumerate() {
                if let Err(e) = self.run_isolated(item).await {
                    error!(
                        subscriber = %self.name,
                        transaction_id = %transaction.id(),
                        item = index,
                        error = %e,
                        "Queued item failed during commit, skipping"
                    );
                }
            }
        })
        .await;

        Ok(())
    }

    async fn abort(&self, transaction: &dyn Transaction) -> AppResult<()> {
        let discarded = self.state.lock().await.queue.clear();
        if discarded > 0 {
            debug!(
                subscriber = %self.name,
                transaction_id = %transaction.id(),
                discarded,
                "Discarded queued items on abort"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex as StdMutex, OnceLock, Weak};

    use txhooks_core::types::TransactionId;

    use crate::subscriber::executor::FnExecutor;

    #[derive(Debug)]
    struct NullTransaction(TransactionId);

    #[async_trait]
    impl Transaction for NullTransaction {
        fn id(&self) -> TransactionId {
            self.0
        }

        async fn commit(&self, _subtransaction: bool) -> AppResult<()> {
            Ok(())
        }

        async fn abort(&self, _subtransaction: bool) -> AppResult<()> {
            Ok(())
        }
    }

    fn recording(
        log: &Arc<StdMutex<Vec<&'static str>>>,
    ) -> FnExecutor<&'static str, &'static str> {
        let log = log.clone();
        FnExecutor::from_fn(move |item: &'static str| {
            if item == "bad" {
                return Err(AppError::internal("boom"));
            }
            log.lock().unwrap().push(item);
            Ok(item)
        })
    }

    fn subscriber(
        log: &Arc<StdMutex<Vec<&'static str>>>,
        mode: SubscriberMode,
    ) -> QueuedSubscriber<FnExecutor<&'static str, &'static str>> {
        QueuedSubscriber::new(
            recording(log),
            &SubscriberOptions::new("test").with_mode(mode),
        )
    }

    #[tokio::test]
    async fn test_queued_push_defers_until_commit() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);
        let tx = NullTransaction(TransactionId::new());

        assert_eq!(sub.push("i1").await.unwrap(), None);
        sub.push("i2").await.unwrap();
        sub.push("i3").await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sub.pending().await, 3);

        sub.commit(&tx).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i2", "i3"]);
        assert_eq!(sub.pending().await, 0);

        sub.commit(&tx).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_abort_discards_without_executing() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);
        let tx = NullTransaction(TransactionId::new());

        sub.push("i1").await.unwrap();
        sub.push("i2").await.unwrap();
        sub.abort(&tx).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sub.pending().await, 0);
    }

    #[tokio::test]
    async fn test_synchronous_push_returns_output() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Synchronous);

        assert_eq!(sub.push("x").await.unwrap(), Some("x"));
        assert_eq!(*log.lock().unwrap(), vec!["x"]);
        assert_eq!(sub.pending().await, 0);
    }

    #[tokio::test]
    async fn test_synchronous_push_failure_propagates() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Synchronous);

        let err = sub.push("bad").await.unwrap_err();
        assert!(err.is(ErrorKind::HookExecution));
    }

    #[tokio::test]
    async fn test_switch_to_synchronous_flushes_once() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);
        let tx = NullTransaction(TransactionId::new());

        sub.push("i1").await.unwrap();
        sub.push("i2").await.unwrap();
        sub.set_mode(SubscriberMode::Synchronous).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i2"]);
        assert_eq!(sub.mode().await, SubscriberMode::Synchronous);

        sub.push("i3").await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i2", "i3"]);

        sub.commit(&tx).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_switch_to_synchronous_runs_all_and_reports_first_failure() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);

        sub.push("bad").await.unwrap();
        sub.push("i2").await.unwrap();
        let err = sub.set_mode(SubscriberMode::Synchronous).await.unwrap_err();

        assert!(err.is(ErrorKind::HookExecution));
        assert_eq!(*log.lock().unwrap(), vec!["i2"]);
        assert_eq!(sub.mode().await, SubscriberMode::Synchronous);
        assert_eq!(sub.pending().await, 0);
    }

    #[tokio::test]
    async fn test_switch_to_queued_has_no_side_effect() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Synchronous);

        sub.set_mode(SubscriberMode::Queued).await.unwrap();
        sub.push("later").await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sub.pending().await, 1);
    }

    #[tokio::test]
    async fn test_commit_skips_failing_item() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);
        let tx = NullTransaction(TransactionId::new());

        sub.push("i1").await.unwrap();
        sub.push("bad").await.unwrap();
        sub.push("i3").await.unwrap();

        assert!(sub.commit(&tx).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i3"]);
    }

    #[tokio::test]
    async fn test_commit_survives_panicking_item() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let executor = {
            let log = log.clone();
            FnExecutor::from_fn(move |item: &'static str| {
                if item == "panic" {
                    panic!("executor exploded");
                }
                log.lock().unwrap().push(item);
                Ok(item)
            })
        };
        let sub = QueuedSubscriber::new(executor, &SubscriberOptions::new("test"));
        let tx = NullTransaction(TransactionId::new());

        sub.push("i1").await.unwrap();
        sub.push("panic").await.unwrap();
        sub.push("i3").await.unwrap();

        assert!(sub.commit(&tx).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i3"]);
        assert_eq!(sub.pending().await, 0);

        sub.push("panic").await.unwrap();
        sub.push("i4").await.unwrap();
        let err = sub.set_mode(SubscriberMode::Synchronous).await.unwrap_err();
        assert!(err.is(ErrorKind::HookExecution));
        assert!(err.message.contains("executor exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["i1", "i3", "i4"]);
    }

    type SelfSwitching = QueuedSubscriber<FnExecutor<String, ()>>;

    #[tokio::test]
    async fn test_set_mode_rejected_from_own_commit() {
        let slot: Arc<OnceLock<Weak<SelfSwitching>>> = Arc::new(OnceLock::new());
        let outcomes = Arc::new(StdMutex::new(Vec::new()));

        let executor = {
            let slot = slot.clone();
            let outcomes = outcomes.clone();
            FnExecutor::new(move |_item: String| {
                let slot = slot.clone();
                let outcomes = outcomes.clone();
                async move {
                    if let Some(sub) = slot.get().and_then(Weak::upgrade) {
                        let result = sub.set_mode(SubscriberMode::Synchronous).await;
                        outcomes.lock().unwrap().push(result.map_err(|e| e.kind));
                    }
                    Ok(())
                }
            })
        };
        let sub = Arc::new(QueuedSubscriber::new(executor, &SubscriberOptions::new("switcher")));
        slot.set(Arc::downgrade(&sub)).unwrap();
        let tx = NullTransaction(TransactionId::new());

        sub.push("item".to_string()).await.unwrap();
        sub.commit(&tx).await.unwrap();

        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![Err(ErrorKind::InvalidState)]
        );
        assert!(!sub.is_dispatching());
        assert_eq!(sub.mode().await, SubscriberMode::Queued);

        sub.set_mode(SubscriberMode::Synchronous).await.unwrap();
        assert_eq!(sub.mode().await, SubscriberMode::Synchronous);
    }

    #[tokio::test]
    async fn test_set_mode_allowed_while_other_task_dispatches() {
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let gates = Arc::new(StdMutex::new((Some(started_tx), Some(release_rx))));

        let executor = FnExecutor::new(move |_item: &'static str| {
            let (started, release) = {
                let mut gates = gates.lock().unwrap();
                (gates.0.take(), gates.1.take())
            };
            async move {
                if let (Some(started), Some(release)) = (started, release) {
                    let _ = started.send(());
                    let _ = release.await;
                }
                Ok(())
            }
        });
        let sub = Arc::new(QueuedSubscriber::new(executor, &SubscriberOptions::new("shared")));
        sub.push("slow").await.unwrap();

        let committing = {
            let sub = sub.clone();
            tokio::spawn(async move {
                let tx = NullTransaction(TransactionId::new());
                sub.commit(&tx).await
            })
        };
        started_rx.await.unwrap();

        assert!(sub.set_mode(SubscriberMode::Synchronous).await.is_ok());

        release_tx.send(()).unwrap();
        committing.await.unwrap().unwrap();
    }

    #[test]
    fn test_enable_disable() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = subscriber(&log, SubscriberMode::Queued);
        assert!(sub.is_enabled());
        sub.disable();
        assert!(!sub.is_enabled());
        sub.enable();
        assert!(sub.is_enabled());
    }
}
