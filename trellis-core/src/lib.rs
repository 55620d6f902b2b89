//! # trellis-core
//!
//! Core types for the Trellis router tree.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! middleware crates that don't need the router itself.
//!
//! # Building Blocks
//!
//! ## Context ([`Context`])
//!
//! The narrow request view every handler works on: method, path, host,
//! protocol, route parameters and a typed [`Extensions`] bag.
//!
//! ## Middleware ([`Middleware`], [`ParamHandler`])
//!
//! The single handler shape. A middleware receives the context and a
//! [`Next`] continuation and decides whether and when to continue.
//!
//! ## Composition ([`compose`], [`Composed`])
//!
//! Flattens plain and path-filtered middleware into one reusable chain with
//! pooled per-invocation state. A [`Composed`] chain is itself a
//! [`Middleware`], so chains nest freely.
//!
//! # Error Types
//!
//! - [`TrellisError`] - Top-level error type
//! - [`ConfigError`] - Registration and rebuild errors
//! - [`ChainError`] - Chain discipline violations
//! - [`UrlError`] - Reverse URL generation errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod compose;
mod context;
mod error;
mod extensions;
mod method;
mod middleware;
mod params;
mod pool;

// Re-exports
pub use compose::{ChainState, Composed, Filter, Invocation, Next, Segment, compose};
pub use context::{Context, Request};
pub use error::{BoxError, ChainError, ConfigError, TrellisError, UrlError};
pub use extensions::Extensions;
pub use futures::future::BoxFuture;
pub use method::Method;
pub use middleware::{
    FnMiddleware, FnParam, Middleware, MiddlewareExt, ParamHandler, ParamHandlerExt,
    SharedMiddleware, SharedParamHandler, from_fn, param_fn,
};
pub use params::Params;
pub use pool::{Pool, Pooled, Recycle};
