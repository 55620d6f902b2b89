//! Testing utilities for Trellis.
//!
//! This module provides middleware that records what ran, so tests can assert
//! on chain order without writing closures.
//!
//! # Features
//!
//! - [`Recorder`]: A shared, cloneable log of labels
//! - [`record`]: Middleware that logs its label and continues
//! - [`respond`]: Middleware that logs its label and ends the chain
//! - [`fail`]: Middleware that returns an error
//! - [`record_param`]: Paramware that logs `label=value` and continues
//!
//! # Example
//!
//! ```rust,ignore
//! let rec = Recorder::new();
//! router.get("/users/:id", [record("auth", &rec).shared(), respond("show", &rec).shared()])?;
//!
//! dispatcher.call(&mut Request::new(Method::Get, "/users/7")).await?;
//! assert_eq!(rec.entries(), vec!["auth", "show"]);
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use trellis_core::{BoxError, BoxFuture, Context, Middleware, Next, ParamHandler};

// ============================================================================
// Recorder
// ============================================================================

/// A shared log of labels pushed by recording middleware.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// A copy of every entry so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Return every entry and clear the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Recording Middleware
// ============================================================================

/// Middleware that records its label. See [`record`] and [`respond`].
#[derive(Debug, Clone)]
pub struct Record {
    label: String,
    recorder: Recorder,
    forward: bool,
    with_path: bool,
}

/// Record `label`, then continue the chain.
pub fn record(label: impl Into<String>, recorder: &Recorder) -> Record {
    Record {
        label: label.into(),
        recorder: recorder.clone(),
        forward: true,
        with_path: false,
    }
}

/// Record `label` and end the chain.
pub fn respond(label: impl Into<String>, recorder: &Recorder) -> Record {
    Record {
        forward: false,
        ..record(label, recorder)
    }
}

impl Record {
    /// Record `"label path"` instead of the bare label.
    pub fn with_path(mut self) -> Self {
        self.with_path = true;
        self
    }
}

impl<C: Context> Middleware<C> for Record {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            if self.with_path {
                self.recorder.push(format!("{} {}", self.label, ctx.path()));
            } else {
                self.recorder.push(self.label.as_str());
            }
            if self.forward {
                next.run(ctx).await
            } else {
                Ok(())
            }
        })
    }
}

/// Middleware that always fails. See [`fail`].
#[derive(Debug, Clone)]
pub struct Fail {
    message: String,
}

/// Return an error carrying `message`.
pub fn fail(message: impl Into<String>) -> Fail {
    Fail {
        message: message.into(),
    }
}

impl<C: Context> Middleware<C> for Fail {
    fn handle<'a>(
        &'a self,
        _ctx: &'a mut C,
        _next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        let message = self.message.clone();
        Box::pin(async move { Err::<(), BoxError>(message.into()) })
    }
}

/// Paramware that records `label=value`. See [`record_param`].
#[derive(Debug, Clone)]
pub struct RecordParam {
    label: String,
    recorder: Recorder,
}

/// Record `label=value`, then continue the chain.
pub fn record_param(label: impl Into<String>, recorder: &Recorder) -> RecordParam {
    RecordParam {
        label: label.into(),
        recorder: recorder.clone(),
    }
}

impl<C: Context> ParamHandler<C> for RecordParam {
    fn handle<'a>(
        &'a self,
        value: String,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            self.recorder.push(format!("{}={}", self.label, value));
            next.run(ctx).await
        })
    }
}
