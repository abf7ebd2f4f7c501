//! Execution routines run by a subscriber for each pushed item.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use txhooks_core::result::AppResult;

/// Performs the side effect of a single pushed item.
#[async_trait]
pub trait ItemExecutor: Send + Sync + 'static {
    /// Payload accepted by [`QueuedSubscriber::push`](super::queued::QueuedSubscriber::push).
    type Item: Send + 'static;
    /// Value produced by executing one item.
    type Output: Send + 'static;

    /// Executes one item.
    async fn execute(&self, item: Self::Item) -> AppResult<Self::Output>;
}

/// A closure-based executor for quick subscriber creation.
pub struct FnExecutor<I, O> {
    /// Handler function.
    handler: Arc<dyn Fn(I) -> BoxFuture<'static, AppResult<O>> + Send + Sync>,
}

impl<I, O> std::fmt::Debug for FnExecutor<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor")
            .field("handler", &"<closure>")
            .finish()
    }
}

impl<I, O> Clone for FnExecutor<I, O> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<I, O> FnExecutor<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Creates an executor from an async closure.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<O>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |item| {
                let fut = handler(item);
                Box::pin(fut)
            }),
        }
    }

    /// Creates an executor from a plain closure whose effect completes inline.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(I) -> AppResult<O> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(move |item| {
                let result = handler(item);
                Box::pin(async move { result })
            }),
        }
    }
}

#[async_trait]
impl<I, O> ItemExecutor for FnExecutor<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Item = I;
    type Output = O;

    async fn execute(&self, item: I) -> AppResult<O> {
        (self.handler)(item).await
    }
}
