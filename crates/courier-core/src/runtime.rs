use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::domain::Job;
use crate::error::HandlerError;

/// Executes one claimed job.
///
/// The handler owns the job for the duration of the call; nothing is returned
/// to the submitter. A handler that needs to report a result should publish it
/// through a [`Broker`](crate::pubsub::Broker) it captured.
#[async_trait]
pub trait JobHandler<P>: Send + Sync {
    async fn handle(&self, job: Job<P>) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct HandlerFn<P, F> {
    f: F,
    _marker: PhantomData<fn(P)>,
}

/// Wrap `f` so it can be used as a handler.
///
/// ```ignore
/// let handler = handler_fn(|job: Job<u64>| async move {
///     println!("{}", job.payload());
///     Ok(())
/// });
/// ```
pub fn handler_fn<P, F, Fut>(f: F) -> HandlerFn<P, F>
where
    F: Fn(Job<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    HandlerFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<P, F, Fut> JobHandler<P> for HandlerFn<P, F>
where
    P: Send + 'static,
    F: Fn(Job<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, job: Job<P>) -> Result<(), HandlerError> {
        (self.f)(job).await
    }
}
