//! Logging middleware for request observation.

use trellis_core::{BoxError, BoxFuture, Context, Middleware, Next};

/// Logs every request that reaches it and how the downstream chain ended.
///
/// Without the `tracing` feature this is a pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl<C: Context> Middleware<C> for Logger {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            #[cfg(feature = "tracing")]
            {
                let method = ctx.method();
                let path = ctx.path().to_string();
                let started = std::time::Instant::now();
                tracing::debug!(%method, %path, "request received");

                let result = next.run(ctx).await;
                match &result {
                    Ok(()) => {
                        tracing::info!(%method, %path, elapsed = ?started.elapsed(), "request handled")
                    }
                    Err(error) => {
                        tracing::warn!(%method, %path, %error, "request failed")
                    }
                }
                result
            }
            #[cfg(not(feature = "tracing"))]
            {
                next.run(ctx).await
            }
        })
    }
}
