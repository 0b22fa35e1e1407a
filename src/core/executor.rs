//! Operation traits wrapping calls into the HTTP collaborator.

use std::future::Future;

use async_trait::async_trait;

use crate::core::{ApiError, ApiResponse};

/// Outcome of a single collaborator call.
pub type OperationResult<T> = Result<ApiResponse<T>, ApiError>;

/// A repeatable async call into the HTTP collaborator.
///
/// The scheduler may invoke `call` several times for one submission when
/// the collaborator reports a retryable failure, so implementations must be
/// safe to re-issue.
///
/// Closures returning a future implement this automatically:
///
/// ```rust,ignore
/// use github_throttle::core::{ApiResponse, ApiOperation};
///
/// let client = client.clone();
/// let op = move || {
///     let client = client.clone();
///     async move { client.get_repo("octo", "app").await }
/// };
/// let handle = scheduler.submit("core", op)?;
/// ```
#[async_trait]
pub trait ApiOperation<T>: Send + 'static
where
    T: Send + 'static,
{
    /// Issue the call once.
    async fn call(&mut self) -> OperationResult<T>;
}

#[async_trait]
impl<T, F, Fut> ApiOperation<T> for F
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = OperationResult<T>> + Send + 'static,
{
    async fn call(&mut self) -> OperationResult<T> {
        (self)().await
    }
}

/// A repeatable blocking call into the HTTP collaborator.
///
/// Used by the synchronous call shape, which sleeps on the calling thread
/// between attempts.
pub trait BlockingOperation<T> {
    /// Issue the call once.
    fn call(&mut self) -> OperationResult<T>;
}

impl<T, F> BlockingOperation<T> for F
where
    F: FnMut() -> OperationResult<T>,
{
    fn call(&mut self) -> OperationResult<T> {
        (self)()
    }
}
