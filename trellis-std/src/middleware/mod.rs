//! # Standard Middleware
//!
//! - [`PathRewrite`]: the mount collaborator, hands a suffix-only path to
//!   nested middleware and restores the original afterwards.
//! - [`Logger`]: request/completion events via `tracing` (feature `tracing`).
//! - [`Timeout`]: races the downstream chain against a timer (feature `timeout`).

mod logging;
mod rewrite;
#[cfg(feature = "timeout")]
mod timeout;

pub use logging::Logger;
pub use rewrite::{MOUNT_PARAM, PathRewrite};
#[cfg(feature = "timeout")]
pub use timeout::{Timeout, TimeoutError};
