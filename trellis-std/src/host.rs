//! Host templates.
//!
//! A host template is a dotted name whose labels may be `:name` parameters,
//! e.g. `:tenant.example.com`. Templates without parameters compare
//! literally; both forms are case-insensitive and ignore a request port.

use regex::Regex;
use std::fmt;
use trellis_core::{ConfigError, Params};

/// A compiled host template.
#[derive(Debug, Clone)]
pub enum HostPattern {
    /// No parameters.
    Literal(String),
    /// At least one `:name` label.
    Pattern {
        /// The template as written.
        source: String,
        /// Anchored, case-insensitive matcher with one group per parameter.
        regex: Regex,
        /// Capture names in group order.
        names: Vec<String>,
    },
}

impl HostPattern {
    /// Whether `source` has at least one `:name` label.
    pub fn is_templated(source: &str) -> bool {
        source.split('.').any(|label| label.starts_with(':'))
    }

    /// Compile a host template.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        if source.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: String::new(),
                reason: "empty host".to_string(),
            });
        }
        if !Self::is_templated(source) {
            return Ok(HostPattern::Literal(source.to_string()));
        }

        let mut names = Vec::new();
        let mut labels = Vec::new();
        for label in source.split('.') {
            match label.strip_prefix(':') {
                Some("") => {
                    return Err(ConfigError::InvalidPattern {
                        pattern: source.to_string(),
                        reason: "unnamed host parameter".to_string(),
                    });
                }
                Some(name) => {
                    names.push(name.to_string());
                    labels.push("([^.]+)".to_string());
                }
                None => labels.push(regex::escape(label)),
            }
        }

        let regex = Regex::new(&format!("(?i)^{}$", labels.join(r"\."))).map_err(|e| {
            ConfigError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(HostPattern::Pattern {
            source: source.to_string(),
            regex,
            names,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        match self {
            HostPattern::Literal(s) => s,
            HostPattern::Pattern { source, .. } => source,
        }
    }

    /// Whether the template has parameters.
    pub fn has_params(&self) -> bool {
        matches!(self, HostPattern::Pattern { .. })
    }

    /// Parameter names in label order.
    pub fn param_names(&self) -> &[String] {
        match self {
            HostPattern::Literal(_) => &[],
            HostPattern::Pattern { names, .. } => names,
        }
    }

    /// Match a request host, returning the extracted parameters.
    pub fn matches(&self, host: &str) -> Option<Params> {
        let host = strip_port(host);
        match self {
            HostPattern::Literal(s) => s.eq_ignore_ascii_case(host).then(Params::new),
            HostPattern::Pattern { regex, names, .. } => {
                let caps = regex.captures(host)?;
                Some(
                    names
                        .iter()
                        .zip(caps.iter().skip(1))
                        .filter_map(|(name, m)| m.map(|m| (name.as_str(), m.as_str())))
                        .collect(),
                )
            }
        }
    }

    /// Fill the template from `params`, recording consumed names in `used`.
    ///
    /// Returns the first missing parameter name on failure.
    pub fn reverse(&self, params: &Params, used: &mut Vec<String>) -> Result<String, String> {
        let HostPattern::Pattern { source, .. } = self else {
            return Ok(self.as_str().to_string());
        };
        let mut labels = Vec::new();
        for label in source.split('.') {
            match label.strip_prefix(':') {
                Some(name) => {
                    let value = params.get(name).ok_or_else(|| name.to_string())?;
                    labels.push(value.to_string());
                    used.push(name.to_string());
                }
                None => labels.push(label.to_string()),
            }
        }
        Ok(labels.join("."))
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drop a trailing `:port` from a host header value.
pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_case_insensitive() {
        let host = HostPattern::parse("api.example.com").unwrap();
        assert!(!host.has_params());
        assert_eq!(host.matches("API.Example.com"), Some(Params::new()));
        assert_eq!(host.matches("api.example.com:8080"), Some(Params::new()));
        assert_eq!(host.matches("www.example.com"), None);
    }

    #[test]
    fn test_pattern_extracts_labels() {
        let host = HostPattern::parse(":tenant.:region.example.com").unwrap();
        assert_eq!(host.param_names(), ["tenant", "region"]);

        let params = host.matches("acme.eu.example.com").unwrap();
        assert_eq!(params.get("tenant"), Some("acme"));
        assert_eq!(params.get("region"), Some("eu"));
        assert!(host.matches("acme.example.com").is_none());
    }

    #[test]
    fn test_reverse() {
        let host = HostPattern::parse(":tenant.example.com").unwrap();
        let mut used = Vec::new();
        let params = Params::from([("tenant", "acme")]);
        assert_eq!(host.reverse(&params, &mut used).unwrap(), "acme.example.com");
        assert_eq!(used, vec!["tenant"]);
        assert_eq!(host.reverse(&Params::new(), &mut used).unwrap_err(), "tenant");
    }
}
