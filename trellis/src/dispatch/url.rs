//! # Named Routes
//!
//! Reverse URL generation from fully-qualified route names.
//!
//! A name starting with `.` is relative: it is expanded with the namespace of
//! the route currently handling the request (or of the router, when called
//! on the tree), so `.list` called from a route in `v1.shop` resolves to
//! `v1.shop.list`.
//!
//! Host resolution, first hit wins:
//!
//! 1. the route's host template, filled from the parameters
//! 2. the router's literal default host
//! 3. the host of the originating request
//!
//! The URL is absolute only if the target host differs from the originating
//! host or [`UrlOptions::absolute`] is set.

use crate::{options::UrlOptions, tree::assemble::NameTarget};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use trellis_core::{ConfigError, Params, Recycle, UrlError};
use trellis_std::{HostPattern, Pattern, host::strip_port};

struct NamedRoute {
    path: Pattern,
    host: Option<HostPattern>,
}

/// Compiled name → route templates.
pub(crate) struct NameRegistry {
    routes: HashMap<String, NamedRoute>,
}

/// Who is asking, for relative names and host resolution.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UrlScope<'s> {
    pub(crate) namespace: Option<&'s str>,
    pub(crate) default_host: Option<&'s str>,
    pub(crate) source_host: Option<&'s str>,
    pub(crate) protocol: &'s str,
}

impl NameRegistry {
    pub(crate) fn compile(names: &BTreeMap<String, NameTarget>) -> Result<Self, ConfigError> {
        let mut routes = HashMap::with_capacity(names.len());
        for (name, target) in names {
            let host = target.host.as_deref().map(HostPattern::parse).transpose()?;
            routes.insert(
                name.clone(),
                NamedRoute {
                    path: target.pattern.clone(),
                    host,
                },
            );
        }
        Ok(Self { routes })
    }

    pub(crate) fn generate(
        &self,
        scope: &UrlScope<'_>,
        name: &str,
        params: &Params,
        options: UrlOptions,
    ) -> Result<String, UrlError> {
        let full = resolve_name(name, scope.namespace);
        let route = self
            .routes
            .get(&full)
            .ok_or_else(|| UrlError::NoSuchRoute(full.clone()))?;

        let mut used = Vec::new();
        let missing = |param: String| UrlError::MissingParam {
            route: full.clone(),
            param,
        };
        let mut url = route.path.reverse(params, &mut used).map_err(missing)?;
        let host = match &route.host {
            Some(host) => Some(host.reverse(params, &mut used).map_err(missing)?),
            None => None,
        }
        .or_else(|| scope.default_host.map(str::to_string))
        .or_else(|| scope.source_host.map(str::to_string));

        let query: Vec<String> = params
            .iter()
            .filter(|(name, _)| !used.iter().any(|u| u.as_str() == *name))
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        let Some(host) = host else {
            return Ok(url);
        };
        let foreign = scope.source_host.is_none_or(|source| {
            !strip_port(source).eq_ignore_ascii_case(strip_port(&host))
        });
        if foreign || options.absolute {
            let protocol = if scope.protocol.is_empty() {
                "http"
            } else {
                scope.protocol
            };
            Ok(format!("{protocol}://{host}{url}"))
        } else {
            Ok(url)
        }
    }
}

/// Expand a leading `.` against `namespace`, or drop it without one.
pub(crate) fn resolve_name(name: &str, namespace: Option<&str>) -> String {
    match (name.strip_prefix('.'), namespace) {
        (Some(rest), Some(ns)) => format!("{ns}.{rest}"),
        (Some(rest), None) => rest.to_string(),
        (None, _) => name.to_string(),
    }
}

/// The URL helper attached to every matched request.
///
/// Handlers find it in the request extensions:
///
/// ```rust,ignore
/// let url = ctx
///     .extensions()
///     .get::<UrlFor>()
///     .ok_or("no router")?
///     .url_for(".show", &Params::from([("id", "7")]), UrlOptions::new())?;
/// ```
#[derive(Default)]
pub struct UrlFor {
    registry: Option<Arc<NameRegistry>>,
    namespace: Option<String>,
    default_host: Option<String>,
    source_host: Option<String>,
    protocol: String,
}

impl UrlFor {
    pub(crate) fn bind(
        &mut self,
        registry: Arc<NameRegistry>,
        namespace: Option<&str>,
        default_host: Option<&str>,
        source_host: Option<&str>,
        protocol: &str,
    ) {
        self.registry = Some(registry);
        self.namespace = namespace.map(str::to_string);
        self.default_host = default_host.map(str::to_string);
        self.source_host = source_host.map(str::to_string);
        self.protocol.push_str(protocol);
    }

    /// Generate the URL of a named route.
    pub fn url_for(
        &self,
        name: &str,
        params: &Params,
        options: UrlOptions,
    ) -> Result<String, UrlError> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| UrlError::NoSuchRoute(name.to_string()))?;
        let scope = UrlScope {
            namespace: self.namespace.as_deref(),
            default_host: self.default_host.as_deref(),
            source_host: self.source_host.as_deref(),
            protocol: &self.protocol,
        };
        registry.generate(&scope, name, params, options)
    }

    /// The namespace relative names expand into.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl Recycle for UrlFor {
    fn recycle(&mut self) {
        self.registry = None;
        self.namespace = None;
        self.default_host = None;
        self.source_host = None;
        self.protocol.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(entries: &[(&str, &str, Option<&str>)]) -> NameRegistry {
        let names = entries
            .iter()
            .map(|(name, path, host)| {
                (
                    name.to_string(),
                    NameTarget {
                        pattern: Pattern::parse(path).unwrap(),
                        host: host.map(str::to_string),
                    },
                )
            })
            .collect();
        NameRegistry::compile(&names).unwrap()
    }

    #[test]
    fn test_relative_names() {
        assert_eq!(resolve_name(".list", Some("v1.shop")), "v1.shop.list");
        assert_eq!(resolve_name(".list", None), "list");
        assert_eq!(resolve_name("v1.list", Some("x")), "v1.list");
    }

    #[test]
    fn test_path_and_query() {
        let reg = registry(&[("user", "/users/:id", None)]);
        let scope = UrlScope {
            protocol: "http",
            ..UrlScope::default()
        };
        let params = Params::from([("id", "7"), ("tab", "a b")]);
        assert_eq!(
            reg.generate(&scope, "user", &params, UrlOptions::new()).unwrap(),
            "/users/7?tab=a%20b"
        );
        assert_eq!(
            reg.generate(&scope, "user", &Params::new(), UrlOptions::new()),
            Err(UrlError::MissingParam {
                route: "user".to_string(),
                param: "id".to_string()
            })
        );
        assert_eq!(
            reg.generate(&scope, "nope", &params, UrlOptions::new()),
            Err(UrlError::NoSuchRoute("nope".to_string()))
        );
    }

    #[test]
    fn test_host_resolution() {
        let reg = registry(&[
            ("tenant", "/", Some(":tenant.example.com")),
            ("local", "/here", None),
        ]);
        let scope = UrlScope {
            source_host: Some("www.example.com"),
            protocol: "https",
            ..UrlScope::default()
        };

        let url = reg
            .generate(&scope, "tenant", &Params::from([("tenant", "acme")]), UrlOptions::new())
            .unwrap();
        assert_eq!(url, "https://acme.example.com/");

        let url = reg
            .generate(&scope, "local", &Params::new(), UrlOptions::new())
            .unwrap();
        assert_eq!(url, "/here");

        let url = reg
            .generate(&scope, "local", &Params::new(), UrlOptions::new().absolute(true))
            .unwrap();
        assert_eq!(url, "https://www.example.com/here");

        let with_default = UrlScope {
            default_host: Some("api.example.com"),
            ..scope
        };
        let url = reg
            .generate(&with_default, "local", &Params::new(), UrlOptions::new())
            .unwrap();
        assert_eq!(url, "https://api.example.com/here");
    }

    #[test]
    fn test_helper_recycles() {
        let mut helper = UrlFor::default();
        helper.bind(
            Arc::new(registry(&[("home", "/", None)])),
            Some("app"),
            None,
            None,
            "http",
        );
        assert_eq!(helper.url_for("home", &Params::new(), UrlOptions::new()).unwrap(), "/");
        helper.recycle();
        assert!(helper.namespace().is_none());
        assert!(helper.url_for("home", &Params::new(), UrlOptions::new()).is_err());
    }
}
