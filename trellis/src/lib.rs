//! # trellis - Composable Router Trees
//!
//! `trellis` builds HTTP-style routers out of small, nestable pieces. Every
//! handler is [`Middleware`]; routers nest inside routers; each router is
//! flattened into one composed chain per route so that dispatch is a single
//! table lookup followed by a single pass down the chain.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! let mut tree = RouterTree::<Request>::new();
//! let app = tree.router(RouterOptions::new())?;
//! let users = tree.router(RouterOptions::new().name("users"))?;
//!
//! tree.router_mut(users)?
//!     .param("id", [load_user.shared_param()])?
//!     .get_with("/:id", RouteOptions::named("show"), [show_user.shared()])?;
//! tree.router_mut(app)?
//!     .use_middleware([Logger.shared()])?
//!     .nest("/users", users)?;
//!
//! let dispatcher = tree.dispatcher(app)?;
//! dispatcher.call(&mut Request::new(Method::Get, "/users/7")).await?;
//! ```
//!
//! ## Chain Order
//!
//! For a matched route the chain is, in order:
//!
//! 1. path-scoped middleware, in registration order across the whole tree
//! 2. dataware, stable-sorted by weight
//! 3. paramware, in the order the route declares its parameters
//! 4. the route's own handlers
//!
//! [`Policy::PARAMWARE_FIRST`] swaps steps 2 and 3.
//!
//! ## Features
//!
//! - `tracing` (default): rebuild and dispatch diagnostics, the [`Logger`] middleware
//! - `timeout`: the `Timeout` middleware
//! - `macros`: the `#[middleware]` attribute

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod data;
mod dispatch;
mod options;
mod param;
mod tree;

pub use data::{DataValue, Dataware, RouteRecord};
pub use dispatch::{Allow, Dispatcher, MatchedRoute, RouteOutcome, UrlFor};
pub use options::{Policy, RouteOptions, RouterOptions, UrlOptions};
pub use tree::{IntoPaths, RouteInfo, RouterId, RouterMut, RouterTree};

pub use trellis_core::{
    BoxError, BoxFuture, ChainError, ChainState, Composed, ConfigError, Context, Extensions,
    Filter, FnMiddleware, FnParam, Method, Middleware, MiddlewareExt, Next, ParamHandler,
    ParamHandlerExt, Params, Pool, Pooled, Recycle, Request, Segment, SharedMiddleware,
    SharedParamHandler, TrellisError, UrlError, compose, from_fn, param_fn,
};

pub use trellis_std::{HostPattern, Logger, MOUNT_PARAM, MatcherOptions, PathRewrite, Pattern};

#[cfg(feature = "timeout")]
pub use trellis_std::middleware::{Timeout, TimeoutError};

#[cfg(feature = "macros")]
pub use trellis_macros::middleware;

/// Testing utilities.
pub mod testing {
    pub use trellis_std::testing::{
        Fail, Record, RecordParam, Recorder, fail, record, record_param, respond,
    };
}

/// Everything needed to build and drive a router tree.
pub mod prelude {
    pub use crate::{
        Allow, BoxError, BoxFuture, Context, Dataware, Dispatcher, MatchedRoute, Method,
        Middleware, MiddlewareExt, Next, ParamHandler, ParamHandlerExt, Params, Policy,
        Request, RouteOptions, RouteOutcome, RouterId, RouterOptions, RouterTree,
        SharedMiddleware, SharedParamHandler, UrlFor, UrlOptions, from_fn, param_fn,
    };
}
