//! Units of work run by the scheduler.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A recurring task body.
///
/// `cancel` only fires for cancellable tasks; other tasks receive a token
/// that is never cancelled.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// Adapter turning an async closure into a [`Job`].
pub struct FnJob<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        (self.f)(cancel).await
    }
}

/// Wrap an async closure as a shareable job.
pub fn job_fn<F, Fut>(f: F) -> Arc<dyn Job>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnJob { f })
}
