//! Matchit-based path matcher.
//!
//! Maps a request path to the value registered for the matching template
//! plus the extracted parameters (percent-decoded).

use crate::pattern::Pattern;
use matchit::{Match, Router as InnerRouter};
use trellis_core::{ConfigError, Params};

/// Options passed through to the matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherOptions {
    /// Retry a failed lookup with the trailing slash toggled.
    pub ignore_trailing_slash: bool,
}

impl MatcherOptions {
    /// Default options.
    pub const fn new() -> Self {
        Self {
            ignore_trailing_slash: false,
        }
    }

    /// Set `ignore_trailing_slash`.
    pub const fn ignore_trailing_slash(mut self, yes: bool) -> Self {
        self.ignore_trailing_slash = yes;
        self
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct Found<'m, V> {
    /// The registered value.
    pub value: &'m V,
    /// Extracted path parameters.
    pub params: Params,
}

/// A path matcher over `matchit`.
pub struct PathMatcher<V> {
    router: InnerRouter<V>,
    options: MatcherOptions,
    len: usize,
}

impl<V> PathMatcher<V> {
    /// Create an empty matcher.
    pub fn new(options: MatcherOptions) -> Self {
        Self {
            router: InnerRouter::new(),
            options,
            len: 0,
        }
    }

    /// Register `value` for a template.
    pub fn insert(&mut self, pattern: &Pattern, value: V) -> Result<(), ConfigError> {
        self.router
            .insert(pattern.matchit_route(), value)
            .map_err(|e| ConfigError::Matcher {
                path: pattern.as_str().to_string(),
                reason: e.to_string(),
            })?;
        self.len += 1;
        Ok(())
    }

    /// Look up a request path.
    pub fn at(&self, path: &str) -> Option<Found<'_, V>> {
        if let Ok(m) = self.router.at(path) {
            return Some(found(m));
        }
        if !self.options.ignore_trailing_slash {
            return None;
        }
        let toggled = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
            Some(_) => return None,
            None => format!("{path}/"),
        };
        self.router.at(&toggled).ok().map(found)
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The options this matcher was built with.
    pub fn options(&self) -> MatcherOptions {
        self.options
    }
}

impl<V> Default for PathMatcher<V> {
    fn default() -> Self {
        Self::new(MatcherOptions::default())
    }
}

fn found<'m, V>(m: Match<'m, '_, &'m V>) -> Found<'m, V> {
    let params = m
        .params
        .iter()
        .map(|(name, raw)| {
            let value = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            (name.to_string(), value)
        })
        .collect();
    Found {
        value: m.value,
        params,
    }
}
