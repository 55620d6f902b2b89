//! # Dispatch Frontend
//!
//! The per-request entry point of a router tree.
//!
//! A [`Dispatcher`] reads the live [`DispatchTable`] of its router, which the
//! tree swaps atomically after every successful rebuild. Per request:
//!
//! 1. Host tables are tried in declaration order; tables without a host are
//!    always eligible, literal hosts compare case-insensitively, templated
//!    hosts extract their parameters.
//! 2. No path match: the outer `next` runs.
//! 3. Path match without a handler for the method: the `OPTIONS` responder
//!    (for `OPTIONS`, if enabled), else the 405 responder (if enabled), else
//!    the outer `next`.
//! 4. Otherwise host and path parameters, a [`MatchedRoute`] and a pooled
//!    [`UrlFor`] helper are attached and the route's composed chain runs. The
//!    helper goes back to the pool whether the chain succeeds or fails, and
//!    any helper or matched route it displaced is put back.

mod table;
pub(crate) mod url;

pub use table::{Allow, MatchedRoute, RouteOutcome};
pub(crate) use table::{DispatchTable, LiveTable};
pub use url::UrlFor;

use std::sync::Arc;
use table::Lookup;
use trellis_core::{
    BoxError, BoxFuture, Context, Method, Middleware, Next, Pool,
};

/// The dispatch entry point of one router.
///
/// Install it in a hosting server's middleware stack, or drive it directly
/// with [`Dispatcher::call`].
pub struct Dispatcher<C> {
    table: LiveTable<C>,
    urls: Arc<Pool<UrlFor>>,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            urls: self.urls.clone(),
        }
    }
}

impl<C: Context> Dispatcher<C> {
    pub(crate) fn new(table: LiveTable<C>) -> Self {
        Self {
            table,
            urls: Arc::new(Pool::new()),
        }
    }

    /// Dispatch with no outer continuation.
    pub fn call<'a>(&'a self, ctx: &'a mut C) -> BoxFuture<'a, Result<(), BoxError>> {
        self.handle(ctx, Next::end())
    }

    /// How many times the table has been rebuilt since the dispatcher was
    /// first created.
    pub fn generation(&self) -> u64 {
        self.table.load().generation()
    }

    /// Number of (host, path) templates in the live table.
    pub fn route_count(&self) -> usize {
        self.table.load().route_count()
    }

    /// Number of idle pooled URL helpers.
    pub fn idle_helpers(&self) -> usize {
        self.urls.idle()
    }
}

impl<C: Context> Middleware<C> for Dispatcher<C> {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let table = self.table.load_full();
            let lookup = table.lookup(ctx.method(), ctx.host(), ctx.path());

            match lookup {
                Lookup::Miss => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(method = %ctx.method(), path = ctx.path(), "no route matched");
                    next.run(ctx).await
                }
                Lookup::NotAllowed(allow) => {
                    let method = ctx.method();
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%method, path = ctx.path(), allow = %allow, "method not allowed");

                    let responder = if method == Method::Options && table.handles_options() {
                        table.options_responder()
                    } else if table.handles_not_allowed() {
                        table.not_allowed_responder()
                    } else {
                        return next.run(ctx).await;
                    };
                    ctx.extensions_mut().insert(allow);
                    responder.handle(ctx, next).await
                }
                Lookup::Hit { endpoint, params } => {
                    ctx.params_mut().extend_from(&params);
                    let outer_matched = ctx.extensions_mut().insert(endpoint.matched());

                    let mut helper = self.urls.take();
                    helper.bind(
                        table.names(),
                        endpoint.namespace(),
                        table.default_host(),
                        ctx.host(),
                        ctx.protocol(),
                    );
                    let outer_helper = ctx.extensions_mut().insert(helper);

                    let result = endpoint.chain().handle(ctx, next).await;

                    // A mounted dispatcher hands the enclosing router's
                    // values back once its own chain is done.
                    if let Some(helper) = ctx.extensions_mut().remove::<UrlFor>() {
                        self.urls.give(helper);
                    }
                    if let Some(helper) = outer_helper {
                        ctx.extensions_mut().insert(helper);
                    }
                    if let Some(matched) = outer_matched {
                        ctx.extensions_mut().insert(matched);
                    }
                    result
                }
            }
        })
    }
}
