//! # Middleware
//!
//! The single handler shape in Trellis. Path-scoped middleware, dataware,
//! paramware and route handlers are all [`Middleware`]: they receive the
//! request context and a [`Next`] continuation, and decide whether and when
//! to continue the chain.
//!
//! ```rust,ignore
//! let timing = from_fn::<Request, _>(|ctx, next| {
//!     async move {
//!         let started = Instant::now();
//!         let result = next.run(ctx).await;
//!         tracing::info!(elapsed = ?started.elapsed());
//!         result
//!     }
//!     .boxed()
//! });
//! ```
//!
//! [`ParamHandler`] is the paramware variant: it additionally receives the
//! value of the parameter it was bound to.

use crate::{compose::Next, error::BoxError};
use futures::future::BoxFuture;
use std::sync::Arc;

/// A step in a handler chain.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not `Middleware<{C}>`",
    label = "missing `Middleware` implementation",
    note = "Wrap closures with `trellis::from_fn` or implement `handle` directly."
)]
pub trait Middleware<C>: Send + Sync + 'static {
    /// Handle the request, optionally continuing via `next`.
    fn handle<'a>(&'a self, ctx: &'a mut C, next: Next<'a, C>)
    -> BoxFuture<'a, Result<(), BoxError>>;
}

/// A reference-counted, type-erased middleware.
pub type SharedMiddleware<C> = Arc<dyn Middleware<C>>;

impl<C: 'static, M: Middleware<C> + ?Sized> Middleware<C> for Arc<M> {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        (**self).handle(ctx, next)
    }
}

/// Middleware backed by a closure. Built with [`from_fn`].
#[derive(Clone)]
pub struct FnMiddleware<F> {
    f: F,
}

/// Adapt a closure into [`Middleware`].
///
/// The closure must return a boxed future (`async move { .. }.boxed()`),
/// which lets it borrow the context for the duration of the call.
pub fn from_fn<C, F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut C, Next<'a, C>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware { f }
}

impl<C: 'static, F> Middleware<C> for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut C, Next<'a, C>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        (self.f)(ctx, next)
    }
}

/// Middleware bound to a named path parameter.
pub trait ParamHandler<C>: Send + Sync + 'static {
    /// Handle the request given the current value of the bound parameter.
    fn handle<'a>(
        &'a self,
        value: String,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// A reference-counted, type-erased paramware handler.
pub type SharedParamHandler<C> = Arc<dyn ParamHandler<C>>;

/// Paramware backed by a closure. Built with [`param_fn`].
#[derive(Clone)]
pub struct FnParam<F> {
    f: F,
}

/// Adapt a closure into a [`ParamHandler`].
pub fn param_fn<C, F>(f: F) -> FnParam<F>
where
    F: for<'a> Fn(String, &'a mut C, Next<'a, C>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    FnParam { f }
}

impl<C: 'static, F> ParamHandler<C> for FnParam<F>
where
    F: for<'a> Fn(String, &'a mut C, Next<'a, C>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    fn handle<'a>(
        &'a self,
        value: String,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        (self.f)(value, ctx, next)
    }
}

/// Conversions into shared, type-erased handlers.
pub trait MiddlewareExt<C>: Middleware<C> + Sized {
    /// Erase and share this middleware.
    fn shared(self) -> SharedMiddleware<C> {
        Arc::new(self)
    }
}

impl<C, M: Middleware<C>> MiddlewareExt<C> for M {}

/// Conversions into shared, type-erased paramware.
pub trait ParamHandlerExt<C>: ParamHandler<C> + Sized {
    /// Erase and share this handler.
    fn shared_param(self) -> SharedParamHandler<C> {
        Arc::new(self)
    }
}

impl<C, P: ParamHandler<C>> ParamHandlerExt<C> for P {}
