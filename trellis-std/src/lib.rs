//! # trellis-std
//!
//! Standard collaborators for the Trellis router tree.
//!
//! This crate provides:
//! - **Path templates**: [`Pattern`] tokenizing, matcher routes, filter regexes, reverse generation
//! - **Host templates**: [`HostPattern`] literal or `:label` matching
//! - **Path matching**: [`PathMatcher`] over `matchit`
//! - **Standard middleware**: [`PathRewrite`], Logger, Timeout
//! - **Testing utilities**: recorders and recording middleware

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use trellis_core;

// Modules
pub mod host;
pub mod matcher;
pub mod middleware;
pub mod pattern;
pub mod testing;

pub use host::HostPattern;
pub use matcher::{Found, MatcherOptions, PathMatcher};
pub use middleware::{Logger, MOUNT_PARAM, PathRewrite};
pub use pattern::{MatchMode, Pattern, Token};
