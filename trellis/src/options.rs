//! Router, route and URL options.

use crate::data::DataValue;
use bitflags::bitflags;
use std::{any::Any, collections::HashMap, fmt};
use trellis_core::SharedMiddleware;
use trellis_std::MatcherOptions;

bitflags! {
    /// Behaviour switches for a router.
    ///
    /// Only the dispatching router's policy decides request-time behaviour
    /// (chain order, OPTIONS and 405 handling). `MOUNT_MIDDLEWARE` is read
    /// from the router that owns each mount route.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Policy: u8 {
        /// Run paramware before dataware.
        const PARAMWARE_FIRST = 1 << 0;
        /// Answer `OPTIONS` for paths that have no `OPTIONS` handler.
        const HANDLE_OPTIONS = 1 << 1;
        /// Answer methods a path does not support with a 405 outcome.
        const HANDLE_NOT_ALLOWED = 1 << 2;
        /// Rewrite the request path for mount routes.
        const MOUNT_MIDDLEWARE = 1 << 3;
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::HANDLE_OPTIONS | Policy::HANDLE_NOT_ALLOWED | Policy::MOUNT_MIDDLEWARE
    }
}

/// Construction options for a router.
pub struct RouterOptions<C> {
    /// Namespace for the names of every route below this router.
    pub name: Option<String>,
    /// Host template applied to routes that do not declare one.
    pub host: Option<String>,
    /// Path prefix applied to every registration on this router.
    pub prefix: Option<String>,
    /// Behaviour switches.
    pub policy: Policy,
    /// Replaces the stock path rewrite on mount routes.
    pub mount_middleware: Option<SharedMiddleware<C>>,
    /// Replaces the stock `OPTIONS` responder.
    pub on_options: Option<SharedMiddleware<C>>,
    /// Replaces the stock 405 responder.
    pub on_not_allowed: Option<SharedMiddleware<C>>,
    /// Passed through to the path matcher.
    pub matcher: MatcherOptions,
}

impl<C> RouterOptions<C> {
    /// Default options.
    pub fn new() -> Self {
        Self {
            name: None,
            host: None,
            prefix: None,
            policy: Policy::default(),
            mount_middleware: None,
            on_options: None,
            on_not_allowed: None,
            matcher: MatcherOptions::new(),
        }
    }

    /// Set the namespace.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the host template.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the path prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Replace the policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Toggle [`Policy::PARAMWARE_FIRST`].
    pub fn paramware_first(mut self, yes: bool) -> Self {
        self.policy.set(Policy::PARAMWARE_FIRST, yes);
        self
    }

    /// Toggle [`Policy::HANDLE_OPTIONS`].
    pub fn handle_options(mut self, yes: bool) -> Self {
        self.policy.set(Policy::HANDLE_OPTIONS, yes);
        self
    }

    /// Toggle [`Policy::HANDLE_NOT_ALLOWED`].
    pub fn handle_not_allowed(mut self, yes: bool) -> Self {
        self.policy.set(Policy::HANDLE_NOT_ALLOWED, yes);
        self
    }

    /// Use `middleware` instead of the stock path rewrite on mount routes.
    pub fn mount_middleware(mut self, middleware: SharedMiddleware<C>) -> Self {
        self.mount_middleware = Some(middleware);
        self.policy.insert(Policy::MOUNT_MIDDLEWARE);
        self
    }

    /// Leave the request path untouched on mount routes.
    pub fn disable_mount_middleware(mut self) -> Self {
        self.mount_middleware = None;
        self.policy.remove(Policy::MOUNT_MIDDLEWARE);
        self
    }

    /// Answer unhandled `OPTIONS` requests with `middleware`.
    pub fn on_options(mut self, middleware: SharedMiddleware<C>) -> Self {
        self.on_options = Some(middleware);
        self
    }

    /// Answer unsupported methods with `middleware`.
    pub fn on_not_allowed(mut self, middleware: SharedMiddleware<C>) -> Self {
        self.on_not_allowed = Some(middleware);
        self
    }

    /// Set the matcher options.
    pub fn matcher(mut self, matcher: MatcherOptions) -> Self {
        self.matcher = matcher;
        self
    }
}

impl<C> Default for RouterOptions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for RouterOptions<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            host: self.host.clone(),
            prefix: self.prefix.clone(),
            policy: self.policy,
            mount_middleware: self.mount_middleware.clone(),
            on_options: self.on_options.clone(),
            on_not_allowed: self.on_not_allowed.clone(),
            matcher: self.matcher,
        }
    }
}

impl<C> fmt::Debug for RouterOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Per-route options: name, host and dataware values.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Route name, namespaced by enclosing router names.
    pub name: Option<String>,
    /// Host template for this route.
    pub host: Option<String>,
    data: HashMap<String, DataValue>,
}

impl RouteOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().name(name)
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the host template.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Attach a dataware value.
    pub fn data<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.data.insert(key.into(), DataValue::new(value));
        self
    }

    /// The dataware value for `key`.
    pub fn get_data(&self, key: &str) -> Option<&DataValue> {
        self.data.get(key)
    }

    /// Whether a value for `key` is attached.
    pub fn has_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Options for reverse URL generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlOptions {
    /// Always emit `protocol://host/path` when a host is known.
    pub absolute: bool,
}

impl UrlOptions {
    /// Default options.
    pub const fn new() -> Self {
        Self { absolute: false }
    }

    /// Request an absolute URL.
    pub const fn absolute(mut self, yes: bool) -> Self {
        self.absolute = yes;
        self
    }
}
