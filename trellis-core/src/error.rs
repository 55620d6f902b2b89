//! Error types for Trellis.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`TrellisError`] - Top-level error type for all Trellis operations
//! - [`ConfigError`] - Invalid registrations and rebuild failures
//! - [`ChainError`] - Violations of the single-pass `next` discipline
//! - [`UrlError`] - Reverse URL generation failures
//!
//! Errors raised by user middleware are carried as [`BoxError`] and are never
//! wrapped or swallowed by the chain.

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Trellis operations.
#[derive(Error, Debug)]
pub enum TrellisError {
    /// A registration or rebuild was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A handler chain was driven incorrectly.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// A reverse URL could not be generated.
    #[error("url error: {0}")]
    Url(#[from] UrlError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors raised while registering routes or rebuilding a router tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A path did not start with `/` or contained an empty segment name.
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    /// A path or host template could not be compiled.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending template.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A method name was not recognised.
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    /// A router id does not belong to this tree.
    #[error("unknown router #{0}")]
    UnknownRouter(usize),

    /// Nesting would make a router its own ancestor.
    #[error("nesting router #{child} under router #{parent} would create a cycle")]
    Cycle {
        /// The router being nested.
        parent: usize,
        /// The router receiving the child.
        child: usize,
    },

    /// Two method entries of the same route declare different hosts.
    #[error("route `{path}` declares conflicting hosts `{first}` and `{second}`")]
    HostConflict {
        /// The merged route path.
        path: String,
        /// The host seen first.
        first: String,
        /// The conflicting host.
        second: String,
    },

    /// The same method was registered twice on one merged path.
    #[error("duplicate route {method} `{path}`")]
    DuplicateRoute {
        /// The method registered twice.
        method: String,
        /// The merged route path.
        path: String,
    },

    /// One fully-qualified route name points at two different paths.
    #[error("route name `{name}` is already bound to `{existing}`")]
    DuplicateName {
        /// The fully-qualified name.
        name: String,
        /// The path the name was bound to first.
        existing: String,
    },

    /// A dataware value does not have the type its constructor expects.
    #[error("data for key `{key}` is a `{found}`, constructor expects `{expected}`")]
    DataType {
        /// The dataware key.
        key: String,
        /// The type the constructor was registered for.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },

    /// The path matcher rejected a route.
    #[error("path matcher rejected `{path}`: {reason}")]
    Matcher {
        /// The merged route path.
        path: String,
        /// The matcher's explanation.
        reason: String,
    },
}

/// Errors raised while driving a composed handler chain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    /// A `next` continuation was invoked after the chain had already moved past it.
    #[error("next() called multiple times (at chain index {index})")]
    NextCalledMultipleTimes {
        /// The chain index the stale continuation pointed at.
        index: usize,
    },
}

/// Errors raised by reverse URL generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// No route is registered under the resolved name.
    #[error("no such named route: `{0}`")]
    NoSuchRoute(String),

    /// A required template parameter was not supplied.
    #[error("route `{route}` requires parameter `{param}`")]
    MissingParam {
        /// The fully-qualified route name.
        route: String,
        /// The missing parameter.
        param: String,
    },
}

// Convenience conversions
impl From<BoxError> for TrellisError {
    fn from(err: BoxError) -> Self {
        TrellisError::Custom(err)
    }
}
