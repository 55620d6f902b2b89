//! Timeout middleware for time-limited handling.

use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use trellis_core::{BoxError, BoxFuture, Context, Middleware, Next};

/// Error returned when the downstream chain does not finish in time.
#[derive(Debug, Clone, Copy, Error)]
#[error("request handling timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Races the rest of the chain against a timer.
///
/// The downstream future is dropped when the timer wins, so only work that
/// reaches an await point is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Create a new timeout middleware.
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// The configured limit.
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

impl<C: Context> Middleware<C> for Timeout {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            match timeout(self.duration, next.run(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(Box::new(TimeoutError(self.duration)) as BoxError),
            }
        })
    }
}
