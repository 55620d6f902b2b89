//! Paramware adaptation.

use trellis_core::{
    BoxError, BoxFuture, Context, Middleware, Next, SharedParamHandler,
};

/// Runs a [`ParamHandler`](trellis_core::ParamHandler) with the current value
/// of its parameter. A route without the parameter skips the handler.
pub(crate) struct ParamAdapter<C> {
    name: String,
    handler: SharedParamHandler<C>,
}

impl<C> ParamAdapter<C> {
    pub(crate) fn new(name: &str, handler: SharedParamHandler<C>) -> Self {
        Self {
            name: name.to_string(),
            handler,
        }
    }
}

impl<C: Context> Middleware<C> for ParamAdapter<C> {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        match ctx.params().get(&self.name).map(str::to_string) {
            Some(value) => self.handler.handle(value, ctx, next),
            None => next.run(ctx),
        }
    }
}
