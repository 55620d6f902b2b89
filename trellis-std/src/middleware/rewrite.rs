//! Mount path rewriting.

use trellis_core::{BoxError, BoxFuture, Context, Middleware, Next};

/// The catch-all parameter a mount route captures its suffix into.
pub const MOUNT_PARAM: &str = "__mount";

/// Replaces the request path with the suffix captured by a mount route for
/// the rest of the chain, then restores it.
///
/// A request for `/api/widgets/1` on a route mounted at `/api` runs the
/// downstream chain with path `/widgets/1`; the original path is put back
/// whether the chain succeeds or fails.
#[derive(Debug, Clone)]
pub struct PathRewrite {
    param: String,
}

impl PathRewrite {
    /// Rewrite from [`MOUNT_PARAM`].
    pub fn new() -> Self {
        Self::with_param(MOUNT_PARAM)
    }

    /// Rewrite from a differently named catch-all.
    pub fn with_param(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl Default for PathRewrite {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Context> Middleware<C> for PathRewrite {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let suffix = ctx.params().get(&self.param).unwrap_or_default();
            let rewritten = format!("/{}", suffix.trim_start_matches('/'));
            let original = ctx.path().to_string();

            ctx.set_path(rewritten);
            let result = next.run(ctx).await;
            ctx.set_path(original);
            result
        })
    }
}
