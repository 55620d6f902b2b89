//! Live dispatch tables.

use crate::{
    dispatch::url::NameRegistry,
    options::{Policy, RouterOptions},
    param::ParamAdapter,
    tree::assemble::{Merged, MergedRoute, RouteEntry},
};
use arc_swap::ArcSwap;
use std::{collections::HashMap, fmt, sync::Arc};
use trellis_core::{
    BoxError, BoxFuture, Composed, ConfigError, Context, Filter, Method, Middleware,
    MiddlewareExt, Next, Params, Segment, SharedMiddleware, compose,
};
use trellis_std::{
    HostPattern, MatchMode, PathMatcher, Pattern,
    pattern::could_overlap,
};

/// A router's table, swapped atomically on rebuild.
pub(crate) type LiveTable<C> = Arc<ArcSwap<DispatchTable<C>>>;

/// The route a request matched, stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    /// The merged route template.
    pub path: String,
    /// The fully-qualified route name.
    pub name: Option<String>,
    /// The matched method.
    pub method: Method,
}

/// The methods a matched path supports, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allow(pub Vec<Method>);

impl Allow {
    /// The supported methods.
    pub fn methods(&self) -> &[Method] {
        &self.0
    }

    /// Whether `method` is supported.
    pub fn contains(&self, method: Method) -> bool {
        self.0.contains(&method)
    }
}

impl fmt::Display for Allow {
    /// Formats as an `Allow` header value: `GET, POST`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(method.as_str())?;
        }
        Ok(())
    }
}

/// What the stock responders leave in the request extensions for the hosting
/// server to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An `OPTIONS` request for a path without an `OPTIONS` handler.
    Options {
        /// Supported methods.
        allow: Allow,
    },
    /// A method the path does not support.
    MethodNotAllowed {
        /// Supported methods.
        allow: Allow,
    },
}

impl RouteOutcome {
    /// Supported methods.
    pub fn allow(&self) -> &Allow {
        match self {
            RouteOutcome::Options { allow } | RouteOutcome::MethodNotAllowed { allow } => allow,
        }
    }

    /// The HTTP status this outcome maps to.
    pub fn status(&self) -> u16 {
        match self {
            RouteOutcome::Options { .. } => 200,
            RouteOutcome::MethodNotAllowed { .. } => 405,
        }
    }
}

struct OptionsResponder;

impl<C: Context> Middleware<C> for OptionsResponder {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        _next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        let allow = ctx.extensions().get::<Allow>().cloned().unwrap_or(Allow(Vec::new()));
        ctx.extensions_mut().insert(RouteOutcome::Options { allow });
        Box::pin(futures::future::ready(Ok::<(), BoxError>(())))
    }
}

struct NotAllowedResponder;

impl<C: Context> Middleware<C> for NotAllowedResponder {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut C,
        _next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        let allow = ctx.extensions().get::<Allow>().cloned().unwrap_or(Allow(Vec::new()));
        ctx.extensions_mut().insert(RouteOutcome::MethodNotAllowed { allow });
        Box::pin(futures::future::ready(Ok::<(), BoxError>(())))
    }
}

/// One composed route handler.
pub(crate) struct Endpoint<C> {
    chain: Composed<C>,
    path: String,
    name: Option<String>,
    namespace: Option<String>,
    method: Method,
}

impl<C> Endpoint<C> {
    pub(crate) fn chain(&self) -> &Composed<C> {
        &self.chain
    }

    pub(crate) fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn matched(&self) -> MatchedRoute {
        MatchedRoute {
            path: self.path.clone(),
            name: self.name.clone(),
            method: self.method,
        }
    }
}

struct RouteSlot<C> {
    endpoints: Vec<(Method, Arc<Endpoint<C>>)>,
    allow: Allow,
}

struct HostTable<C> {
    host: Option<HostPattern>,
    matcher: PathMatcher<RouteSlot<C>>,
}

pub(crate) enum Lookup<C> {
    Miss,
    NotAllowed(Allow),
    Hit {
        endpoint: Arc<Endpoint<C>>,
        params: Params,
    },
}

struct CompiledMiddleware<'m, C> {
    pattern: &'m Pattern,
    host: Option<&'m str>,
    filter: Filter,
    handlers: &'m [SharedMiddleware<C>],
}

/// Everything a dispatcher needs, built from a router's merged view.
pub(crate) struct DispatchTable<C> {
    hosts: Vec<HostTable<C>>,
    names: Arc<NameRegistry>,
    policy: Policy,
    on_options: SharedMiddleware<C>,
    on_not_allowed: SharedMiddleware<C>,
    default_host: Option<String>,
    generation: u64,
}

impl<C: Context> DispatchTable<C> {
    pub(crate) fn build(
        options: &RouterOptions<C>,
        merged: &Merged<C>,
        generation: u64,
    ) -> Result<Self, ConfigError> {
        let middleware = merged
            .middleware
            .iter()
            .map(|mw| {
                Ok(CompiledMiddleware {
                    pattern: &mw.pattern,
                    host: mw.host.as_deref(),
                    filter: filter_for(&mw.pattern)?,
                    handlers: &mw.handlers,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut hosts: Vec<HostTable<C>> = Vec::new();
        let mut host_index: HashMap<Option<String>, usize> = HashMap::new();
        for route in &merged.routes {
            let key = route.host.as_deref().map(str::to_ascii_lowercase);
            let index = match host_index.get(&key) {
                Some(&index) => index,
                None => {
                    hosts.push(HostTable {
                        host: route.host.as_deref().map(HostPattern::parse).transpose()?,
                        matcher: PathMatcher::new(options.matcher),
                    });
                    host_index.insert(key, hosts.len() - 1);
                    hosts.len() - 1
                }
            };

            let endpoints = route
                .entries
                .iter()
                .map(|entry| {
                    let endpoint = Endpoint {
                        chain: compose_entry(options.policy, &middleware, route, entry)?,
                        path: route.pattern.as_str().to_string(),
                        name: entry.name.clone(),
                        namespace: entry.namespace.clone(),
                        method: entry.method,
                    };
                    Ok((entry.method, Arc::new(endpoint)))
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            let slot = RouteSlot {
                endpoints,
                allow: Allow(route.methods()),
            };
            hosts[index].matcher.insert(&route.pattern, slot)?;
        }

        let default_host = options
            .host
            .clone()
            .filter(|host| !HostPattern::is_templated(host));

        Ok(Self {
            hosts,
            names: Arc::new(NameRegistry::compile(&merged.names)?),
            policy: options.policy,
            on_options: options
                .on_options
                .clone()
                .unwrap_or_else(|| OptionsResponder.shared()),
            on_not_allowed: options
                .on_not_allowed
                .clone()
                .unwrap_or_else(|| NotAllowedResponder.shared()),
            default_host,
            generation,
        })
    }
}

impl<C> DispatchTable<C> {
    pub(crate) fn lookup(&self, method: Method, host: Option<&str>, path: &str) -> Lookup<C> {
        for table in &self.hosts {
            let host_params = match (&table.host, host) {
                (None, _) => Params::new(),
                (Some(pattern), Some(host)) => match pattern.matches(host) {
                    Some(params) => params,
                    None => continue,
                },
                (Some(_), None) => continue,
            };
            let Some(found) = table.matcher.at(path) else {
                continue;
            };

            let slot = found.value;
            return match slot.endpoints.iter().find(|(m, _)| *m == method) {
                Some((_, endpoint)) => {
                    let mut params = host_params;
                    params.extend_from(&found.params);
                    Lookup::Hit {
                        endpoint: endpoint.clone(),
                        params,
                    }
                }
                None => Lookup::NotAllowed(slot.allow.clone()),
            };
        }
        Lookup::Miss
    }

    pub(crate) fn handles_options(&self) -> bool {
        self.policy.contains(Policy::HANDLE_OPTIONS)
    }

    pub(crate) fn handles_not_allowed(&self) -> bool {
        self.policy.contains(Policy::HANDLE_NOT_ALLOWED)
    }

    pub(crate) fn options_responder(&self) -> SharedMiddleware<C> {
        self.on_options.clone()
    }

    pub(crate) fn not_allowed_responder(&self) -> SharedMiddleware<C> {
        self.on_not_allowed.clone()
    }

    pub(crate) fn names(&self) -> Arc<NameRegistry> {
        self.names.clone()
    }

    pub(crate) fn default_host(&self) -> Option<&str> {
        self.default_host.as_deref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn route_count(&self) -> usize {
        self.hosts.iter().map(|h| h.matcher.len()).sum()
    }
}

/// `/` never filters, literal paths use a prefix test, templates a regex.
fn filter_for(pattern: &Pattern) -> Result<Filter, ConfigError> {
    if pattern.tokens().is_empty() {
        Ok(Filter::Always)
    } else if pattern.is_static() {
        Ok(Filter::prefix(pattern.as_str()))
    } else {
        pattern.to_regex(MatchMode::Prefix).map(Filter::from)
    }
}

/// Middleware, then dataware by weight, then paramware by parameter order,
/// then the route's own handlers.
fn compose_entry<C: Context>(
    policy: Policy,
    middleware: &[CompiledMiddleware<'_, C>],
    route: &MergedRoute<C>,
    entry: &RouteEntry<C>,
) -> Result<Composed<C>, ConfigError> {
    let mut segments = Vec::new();

    for mw in middleware {
        let same_host = match (mw.host, route.host.as_deref()) {
            (None, _) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (Some(_), None) => false,
        };
        if !same_host || !could_overlap(mw.pattern, &route.pattern) {
            continue;
        }
        for handler in mw.handlers {
            segments.push(match &mw.filter {
                Filter::Always => Segment::Handler(handler.clone()),
                filter => Segment::Filtered {
                    handler: handler.clone(),
                    filter: filter.clone(),
                },
            });
        }
    }

    let dataware = entry
        .build_dataware(route)?
        .into_iter()
        .map(|d| Segment::Handler(d.handler));

    let mut paramware = Vec::new();
    for name in route.pattern.param_names() {
        for handler in entry.paramware.get(name).into_iter().flatten() {
            let adapter = ParamAdapter::new(name, handler.clone());
            paramware.push(Segment::Handler(adapter.shared()));
        }
    }

    if policy.contains(Policy::PARAMWARE_FIRST) {
        segments.extend(paramware);
        segments.extend(dataware);
    } else {
        segments.extend(dataware);
        segments.extend(paramware);
    }
    segments.extend(entry.handlers.iter().cloned().map(Segment::Handler));

    Ok(compose(segments))
}
