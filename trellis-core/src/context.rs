//! # Request Context
//!
//! The hosting server owns the request; Trellis only needs a narrow view of
//! it. [`Context`] is that view: method, path, host, protocol, and two
//! mutable bags ([`Params`] and [`Extensions`]) that the dispatch frontend
//! fills in before the composed chain runs.
//!
//! [`Request`] is a plain implementation, used by tests and by adapters that
//! translate a server request into a Trellis context up front.

use crate::{extensions::Extensions, method::Method, params::Params};

/// The request view every middleware operates on.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a Trellis request context",
    label = "missing `Context` implementation",
    note = "Contexts expose method, path, host, params and extensions to the router."
)]
pub trait Context: Send + 'static {
    /// The request method.
    fn method(&self) -> Method;

    /// The effective request path, without query string.
    fn path(&self) -> &str;

    /// Replace the effective request path.
    ///
    /// Mount points use this to hand a suffix-only path to nested middleware.
    fn set_path(&mut self, path: String);

    /// The request host, if known.
    fn host(&self) -> Option<&str>;

    /// The request protocol, e.g. `http` or `https`.
    fn protocol(&self) -> &str {
        "http"
    }

    /// Route and host parameters attached by the dispatcher.
    fn params(&self) -> &Params;

    /// Mutable access to the parameters.
    fn params_mut(&mut self) -> &mut Params;

    /// The typed state bag.
    fn extensions(&self) -> &Extensions;

    /// Mutable access to the typed state bag.
    fn extensions_mut(&mut self) -> &mut Extensions;
}

/// A self-contained request context.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    host: Option<String>,
    protocol: String,
    params: Params,
    extensions: Extensions,
}

impl Request {
    /// Create a request for `method` and `path`. A query string is dropped.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if let Some(idx) = path.find('?') {
            path.truncate(idx);
        }
        Self {
            method,
            path,
            host: None,
            protocol: "http".to_string(),
            params: Params::new(),
            extensions: Extensions::new(),
        }
    }

    /// Set the request host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the request protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }
}

impl Context for Request {
    fn method(&self) -> Method {
        self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn set_path(&mut self, path: String) {
        self.path = path;
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
