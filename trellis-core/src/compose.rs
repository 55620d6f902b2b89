//! # Composition Engine
//!
//! Flattens an ordered list of plain or path-filtered middleware into one
//! reusable [`Composed`] chain.
//!
//! # Execution model
//!
//! Every invocation checks out an [`Invocation`] from the chain's pool. The
//! invocation carries a cursor (modelled as [`ChainState`]) which only ever
//! moves forward: calling a [`Next`] that points at or before the cursor
//! fails with [`ChainError::NextCalledMultipleTimes`]. When a step runs, the
//! engine skips every filtered entry whose filter rejects the current request
//! path, runs the first eligible entry, and hands it a `Next` pointing just
//! past itself. Past the last entry the chain continues with the outer `Next`
//! it was invoked with, or resolves if that is [`Next::end`].
//!
//! The invocation is returned to the pool when the top-level call finishes,
//! successfully or not, and is cleared before reuse.

use crate::{
    context::Context,
    error::{BoxError, ChainError, ConfigError},
    middleware::{Middleware, SharedMiddleware},
    pool::{Pool, Recycle},
};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;

/// Progress of one chain invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainState {
    /// No entry has run yet.
    #[default]
    NotStarted,
    /// The entry at this index is the furthest one reached.
    Running(usize),
    /// The chain ran past its last entry, or finished without error.
    Completed,
    /// The chain finished with an error.
    Failed,
}

/// A per-request path test attached to a chain entry.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Always eligible.
    Always,
    /// Eligible when the path equals the prefix or continues it with `/`.
    Prefix(Arc<str>),
    /// Eligible when the regex matches the path.
    Pattern(Arc<Regex>),
}

impl Filter {
    /// A segment-boundary prefix filter. `/` and the empty prefix never filter.
    pub fn prefix(prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref().trim_end_matches('/');
        if prefix.is_empty() {
            Filter::Always
        } else {
            Filter::Prefix(Arc::from(prefix))
        }
    }

    /// A regex filter.
    pub fn pattern(regex: &str) -> Result<Self, ConfigError> {
        Regex::new(regex)
            .map(Filter::from)
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: regex.to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether this filter can reject a path.
    pub fn is_filtered(&self) -> bool {
        !matches!(self, Filter::Always)
    }

    /// Test a request path.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Filter::Always => true,
            Filter::Prefix(prefix) => path
                .strip_prefix(&**prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            Filter::Pattern(re) => re.is_match(path),
        }
    }
}

impl From<Regex> for Filter {
    fn from(re: Regex) -> Self {
        Filter::Pattern(Arc::new(re))
    }
}

/// One input to [`compose`].
pub enum Segment<C> {
    /// An unfiltered handler.
    Handler(SharedMiddleware<C>),
    /// A handler that only runs when its filter accepts the request path.
    Filtered {
        /// The handler.
        handler: SharedMiddleware<C>,
        /// Its path test.
        filter: Filter,
    },
    /// A nested list, flattened in order.
    Many(Vec<Segment<C>>),
}

impl<C> From<SharedMiddleware<C>> for Segment<C> {
    fn from(handler: SharedMiddleware<C>) -> Self {
        Segment::Handler(handler)
    }
}

impl<C> From<Vec<SharedMiddleware<C>>> for Segment<C> {
    fn from(handlers: Vec<SharedMiddleware<C>>) -> Self {
        Segment::Many(handlers.into_iter().map(Segment::Handler).collect())
    }
}

struct Entry<C> {
    handler: SharedMiddleware<C>,
    filter: Filter,
}

/// Pooled per-invocation state.
#[derive(Default)]
pub struct Invocation {
    state: Mutex<ChainState>,
}

impl Invocation {
    /// The current state.
    pub fn state(&self) -> ChainState {
        *self.state.lock()
    }

    /// Move the cursor from a continuation at `from` to the entry at `to`.
    fn advance(&self, from: usize, to: usize, len: usize) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        let fresh = match *state {
            ChainState::NotStarted => true,
            ChainState::Running(cursor) => from > cursor,
            ChainState::Completed | ChainState::Failed => false,
        };
        if !fresh {
            return Err(ChainError::NextCalledMultipleTimes { index: from });
        }
        *state = if to >= len {
            ChainState::Completed
        } else {
            ChainState::Running(to)
        };
        Ok(())
    }

    fn finish(&self, ok: bool) {
        *self.state.lock() = if ok {
            ChainState::Completed
        } else {
            ChainState::Failed
        };
    }
}

impl Recycle for Invocation {
    fn recycle(&mut self) {
        *self.state.get_mut() = ChainState::NotStarted;
    }
}

struct Step<'a, C> {
    entries: &'a [Entry<C>],
    invocation: &'a Invocation,
    index: usize,
    tail: &'a Next<'a, C>,
}

impl<C> Clone for Step<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Step<'_, C> {}

/// The continuation handed to every middleware.
///
/// `Next` is `Copy` so that misuse surfaces as a runtime
/// [`ChainError::NextCalledMultipleTimes`] rather than being silently
/// impossible to express.
pub struct Next<'a, C> {
    step: Option<Step<'a, C>>,
}

impl<C> Clone for Next<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Next<'_, C> {}

impl<'a, C> Next<'a, C> {
    /// A continuation that resolves immediately.
    pub const fn end() -> Self {
        Self { step: None }
    }

    /// Whether this continuation resolves immediately.
    pub fn is_end(&self) -> bool {
        self.step.is_none()
    }

    fn start(
        entries: &'a [Entry<C>],
        invocation: &'a Invocation,
        tail: &'a Next<'a, C>,
    ) -> Self {
        Self {
            step: Some(Step {
                entries,
                invocation,
                index: 0,
                tail,
            }),
        }
    }
}

impl<'a, C: Context> Next<'a, C> {
    /// Continue the chain.
    pub fn run<'b>(self, ctx: &'b mut C) -> BoxFuture<'b, Result<(), BoxError>>
    where
        'a: 'b,
    {
        let Some(step) = self.step else {
            return future::ready(Ok(())).boxed();
        };

        Box::pin(async move {
            let len = step.entries.len();
            let found = {
                let path = ctx.path();
                step.entries
                    .iter()
                    .enumerate()
                    .skip(step.index)
                    .find(|(_, entry)| entry.filter.matches(path))
                    .map(|(i, _)| i)
            };
            step.invocation
                .advance(step.index, found.unwrap_or(len), len)?;

            match found {
                Some(i) => {
                    let next = Next {
                        step: Some(Step { index: i + 1, ..step }),
                    };
                    step.entries[i].handler.handle(ctx, next).await
                }
                None => {
                    let tail = *step.tail;
                    tail.run(ctx).await
                }
            }
        })
    }
}

/// A flattened, reusable handler chain.
pub struct Composed<C> {
    entries: Vec<Entry<C>>,
    pool: Pool<Invocation>,
}

/// Build a [`Composed`] chain from segments.
pub fn compose<C>(segments: impl IntoIterator<Item = Segment<C>>) -> Composed<C> {
    Composed::new(segments)
}

impl<C> Composed<C> {
    /// Build a chain from segments, flattening nested lists.
    pub fn new(segments: impl IntoIterator<Item = Segment<C>>) -> Self {
        let mut entries = Vec::new();
        for segment in segments {
            flatten(segment, &mut entries);
        }
        Self {
            entries,
            pool: Pool::new(),
        }
    }

    /// Number of flattened entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of idle pooled invocations.
    pub fn idle_invocations(&self) -> usize {
        self.pool.idle()
    }
}

impl<C: Context> Composed<C> {
    /// Run the chain with no outer continuation.
    pub fn call<'a>(&'a self, ctx: &'a mut C) -> BoxFuture<'a, Result<(), BoxError>> {
        self.handle(ctx, Next::end())
    }
}

impl<C: Context> Middleware<C> for Composed<C> {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let invocation = self.pool.checkout();
            let result = Next::start(&self.entries, &invocation, &next)
                .run(ctx)
                .await;
            invocation.finish(result.is_ok());
            result
        })
    }
}

fn flatten<C>(segment: Segment<C>, out: &mut Vec<Entry<C>>) {
    match segment {
        Segment::Handler(handler) => out.push(Entry {
            handler,
            filter: Filter::Always,
        }),
        Segment::Filtered { handler, filter } => out.push(Entry { handler, filter }),
        Segment::Many(segments) => {
            for segment in segments {
                flatten(segment, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Request, method::Method, middleware::MiddlewareExt};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    enum Mode {
        Forward,
        Stop,
        Twice,
        Fail,
        Yield,
    }

    struct Step {
        label: &'static str,
        log: Log,
        mode: Mode,
    }

    fn step(label: &'static str, log: &Log, mode: Mode) -> SharedMiddleware<Request> {
        Step {
            label,
            log: log.clone(),
            mode,
        }
        .shared()
    }

    impl Middleware<Request> for Step {
        fn handle<'a>(
            &'a self,
            ctx: &'a mut Request,
            next: Next<'a, Request>,
        ) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                self.log.lock().push(self.label);
                match self.mode {
                    Mode::Forward => next.run(ctx).await,
                    Mode::Stop => Ok(()),
                    Mode::Twice => {
                        next.run(ctx).await?;
                        next.run(ctx).await
                    }
                    Mode::Fail => Err("boom".into()),
                    Mode::Yield => {
                        tokio::task::yield_now().await;
                        next.run(ctx).await
                    }
                }
            })
        }
    }

    fn request(path: &str) -> Request {
        Request::new(Method::Get, path)
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let log = Log::default();
        let chain = compose([
            Segment::from(step("a", &log, Mode::Forward)),
            Segment::from(vec![
                step("b", &log, Mode::Forward),
                step("c", &log, Mode::Stop),
            ]),
            Segment::from(step("d", &log, Mode::Forward)),
        ]);
        assert_eq!(chain.len(), 4);

        chain.call(&mut request("/")).await.unwrap();
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_filters_skip_non_matching_paths() {
        let log = Log::default();
        let chain = compose([
            Segment::Filtered {
                handler: step("api", &log, Mode::Forward),
                filter: Filter::prefix("/api"),
            },
            Segment::Filtered {
                handler: step("user", &log, Mode::Forward),
                filter: Filter::pattern(r"^/users/[^/]+(?:/|$)").unwrap(),
            },
            Segment::from(step("end", &log, Mode::Stop)),
        ]);

        chain.call(&mut request("/api/widgets")).await.unwrap();
        chain.call(&mut request("/apiary")).await.unwrap();
        chain.call(&mut request("/users/7")).await.unwrap();
        assert_eq!(*log.lock(), vec!["api", "end", "end", "user", "end"]);
    }

    #[tokio::test]
    async fn test_double_next_is_rejected() {
        let log = Log::default();
        let chain = compose([
            Segment::from(step("twice", &log, Mode::Twice)),
            Segment::from(step("inner", &log, Mode::Forward)),
        ]);

        let err = chain.call(&mut request("/")).await.unwrap_err();
        let chain_err = err.downcast_ref::<ChainError>().unwrap();
        assert_eq!(*chain_err, ChainError::NextCalledMultipleTimes { index: 1 });
        assert!(err.to_string().contains("called multiple times"));
        // The first continuation still ran.
        assert_eq!(*log.lock(), vec!["twice", "inner"]);
    }

    #[tokio::test]
    async fn test_outer_next_runs_after_last_entry() {
        let log = Log::default();
        let inner = compose([Segment::from(step("inner", &log, Mode::Forward))]).shared();
        let outer = compose([
            Segment::from(inner),
            Segment::from(step("after", &log, Mode::Stop)),
        ]);

        outer.call(&mut request("/")).await.unwrap();
        assert_eq!(*log.lock(), vec!["inner", "after"]);
    }

    #[tokio::test]
    async fn test_errors_propagate_and_state_is_returned() {
        let log = Log::default();
        let chain = compose([
            Segment::from(step("a", &log, Mode::Forward)),
            Segment::from(step("fail", &log, Mode::Fail)),
        ]);

        let err = chain.call(&mut request("/")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(chain.idle_invocations(), 1);

        // A recycled invocation starts fresh.
        log.lock().clear();
        assert!(chain.call(&mut request("/")).await.is_err());
        assert_eq!(*log.lock(), vec!["a", "fail"]);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let log = Log::default();
        let chain = compose([
            Segment::from(step("y", &log, Mode::Yield)),
            Segment::from(step("z", &log, Mode::Stop)),
        ]);

        let mut r1 = request("/");
        let mut r2 = request("/");
        let (a, b) = futures::join!(chain.call(&mut r1), chain.call(&mut r2));
        a.unwrap();
        b.unwrap();
        assert_eq!(log.lock().len(), 4);
        assert_eq!(chain.idle_invocations(), 2);
    }

    #[test]
    fn test_filter_prefix_boundaries() {
        assert!(!Filter::prefix("/").is_filtered());
        let filter = Filter::prefix("/api/");
        assert!(filter.matches("/api"));
        assert!(filter.matches("/api/x"));
        assert!(!filter.matches("/apix"));
        assert!(Filter::pattern("(").is_err());
    }
}
