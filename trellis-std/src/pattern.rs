//! # Path Templates
//!
//! Compiles route and middleware path templates into tokens and derives
//! everything the router tree needs from them: parameter names, the matcher
//! route string, the per-request filter regex, and reverse generation.
//!
//! # Syntax
//!
//! | Segment | Meaning |
//! |---------|---------|
//! | `users` | literal |
//! | `:id` | one segment, captured as `id` |
//! | `*rest` | the remainder of the path, captured as `rest` (last segment only) |
//! | `*` | the remainder, captured as `wildcard` |

use regex::Regex;
use std::fmt;
use trellis_core::{ConfigError, Params};

/// Name given to an anonymous `*` segment.
pub const WILDCARD: &str = "wildcard";

/// One path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Matches itself.
    Literal(String),
    /// Matches one segment.
    Param(String),
    /// Matches the rest of the path.
    CatchAll(String),
}

/// How a generated regex anchors its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The whole path must match.
    Exact,
    /// The template must match a segment-aligned prefix.
    Prefix,
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    /// Compile a template. It must start with `/`.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let rest = source
            .strip_prefix('/')
            .ok_or_else(|| ConfigError::InvalidPath(source.to_string()))?;

        let mut tokens = Vec::new();
        if !rest.is_empty() {
            let segments: Vec<&str> = rest.split('/').collect();
            let last = segments.len() - 1;
            for (i, segment) in segments.into_iter().enumerate() {
                tokens.push(parse_segment(source, segment, i == last)?);
            }
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(name) | Token::CatchAll(name) => Some(name.as_str()),
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// Whether the template has no parameters.
    pub fn is_static(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }

    /// The first segment, when it is a literal.
    pub fn first_segment(&self) -> Option<&str> {
        match self.tokens.first() {
            Some(Token::Literal(s)) => Some(s),
            _ => None,
        }
    }

    /// Render in `matchit` route syntax.
    pub fn matchit_route(&self) -> String {
        if self.tokens.is_empty() {
            return "/".to_string();
        }
        let mut out = String::with_capacity(self.source.len() + 4);
        for token in &self.tokens {
            out.push('/');
            match token {
                Token::Literal(s) => out.push_str(&s.replace('{', "{{").replace('}', "}}")),
                Token::Param(name) => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
                Token::CatchAll(name) => {
                    out.push_str("{*");
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Regex source matching request paths against this template.
    pub fn regex_source(&self, mode: MatchMode) -> String {
        let mut out = String::from("^");
        for token in &self.tokens {
            out.push('/');
            match token {
                Token::Literal(s) => out.push_str(&regex::escape(s)),
                Token::Param(_) => out.push_str("[^/]+"),
                Token::CatchAll(_) => out.push_str(".*"),
            }
        }
        match mode {
            MatchMode::Exact if self.tokens.is_empty() => out.push_str("/$"),
            MatchMode::Exact => out.push('$'),
            MatchMode::Prefix => out.push_str("(?:/|$)"),
        }
        out
    }

    /// Compile [`Self::regex_source`].
    pub fn to_regex(&self, mode: MatchMode) -> Result<Regex, ConfigError> {
        let source = self.regex_source(mode);
        Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
            pattern: self.source.clone(),
            reason: e.to_string(),
        })
    }

    /// Fill the template from `params`, recording consumed names in `used`.
    ///
    /// Values are percent-encoded; a catch-all keeps its `/` separators.
    /// Returns the first missing parameter name on failure.
    pub fn reverse(&self, params: &Params, used: &mut Vec<String>) -> Result<String, String> {
        if self.tokens.is_empty() {
            return Ok("/".to_string());
        }
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            out.push('/');
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Param(name) => {
                    let value = params.get(name).ok_or_else(|| name.clone())?;
                    out.push_str(&urlencoding::encode(value));
                    used.push(name.clone());
                }
                Token::CatchAll(name) => {
                    let value = params.get(name).ok_or_else(|| name.clone())?;
                    let encoded: Vec<_> = value
                        .trim_start_matches('/')
                        .split('/')
                        .map(urlencoding::encode)
                        .collect();
                    out.push_str(&encoded.join("/"));
                    used.push(name.clone());
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segment(source: &str, segment: &str, last: bool) -> Result<Token, ConfigError> {
    if let Some(name) = segment.strip_prefix(':') {
        if name.is_empty() {
            return Err(ConfigError::InvalidPath(source.to_string()));
        }
        return Ok(Token::Param(name.to_string()));
    }
    if let Some(name) = segment.strip_prefix('*') {
        if !last {
            return Err(ConfigError::InvalidPattern {
                pattern: source.to_string(),
                reason: "catch-all must be the last segment".to_string(),
            });
        }
        let name = if name.is_empty() { WILDCARD } else { name };
        return Ok(Token::CatchAll(name.to_string()));
    }
    Ok(Token::Literal(segment.to_string()))
}

/// Join a mount prefix and a path, normalising the slash between them.
///
/// ```rust
/// use trellis_std::pattern::join_paths;
///
/// assert_eq!(join_paths("/api/", "/users"), "/api/users");
/// assert_eq!(join_paths("/api", "/"), "/api");
/// assert_eq!(join_paths("/", "/users"), "/users");
/// ```
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path) {
        (true, "") => "/".to_string(),
        (true, _) => path.to_string(),
        (false, "" | "/") => prefix.to_string(),
        (false, _) => format!("{prefix}{path}"),
    }
}

/// Whether a middleware registered at `middleware` could run for a route at
/// `route`.
///
/// Only the first segment is compared, so this over-includes. Candidates that
/// do not actually apply are rejected per request by their filter.
pub fn could_overlap(middleware: &Pattern, route: &Pattern) -> bool {
    if middleware.tokens.is_empty() {
        return true;
    }
    match (middleware.first_segment(), route.first_segment()) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
