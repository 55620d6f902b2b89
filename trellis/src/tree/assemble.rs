//! # Router Tree Assembler
//!
//! Flattens one router's registrations plus its children's merged views into
//! a new merged view. The merge is a pure function of its inputs: nothing in
//! a child's view is modified, every inherited entry is cloned first.
//!
//! Per router, in order:
//!
//! 1. Middleware and routes are merged in registration order, children's
//!    paths re-prefixed by the mount path and this router's prefix.
//! 2. Routes are keyed by host and path; one method twice is an error.
//! 3. For every merged route entry: names are namespaced, paramware for the
//!    route's parameters is prepended, defaults and sort overrides are
//!    inherited (the most specific one wins), this router's dataware keys
//!    are queued, and finally this router's exclusive keys are recorded so
//!    ancestors can no longer apply them.
//!
//! Queued dataware keys are type-checked against the values visible so far
//! at every level, and only run their constructors once a live table is
//! built from the root's view, when every inherited default is known.

use crate::{
    data::{DataValue, RouteRecord},
    options::{Policy, RouteOptions, RouterOptions},
    tree::{
        RouterId,
        node::{DataKey, Raw, Registration, RouteDef},
    },
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use trellis_core::{
    ConfigError, Context, Method, MiddlewareExt, SharedMiddleware, SharedParamHandler,
};
use trellis_std::{
    PathRewrite,
    pattern::{Pattern, join_paths},
};

/// Data key reserved for the mount path rewrite.
pub(crate) const MOUNT_KEY: &str = "__mount";

/// One resolved dataware handler.
pub(crate) struct DataEntry<C> {
    pub(crate) key: String,
    pub(crate) handler: SharedMiddleware<C>,
    pub(crate) explicit: Option<i32>,
    pub(crate) key_weight: Option<i32>,
}

impl<C> DataEntry<C> {
    /// Explicit weight, else the route's sort override, else the key weight.
    pub(crate) fn weight(&self, overrides: &HashMap<String, i32>) -> i32 {
        self.explicit
            .or_else(|| overrides.get(&self.key).copied())
            .or(self.key_weight)
            .unwrap_or(0)
    }
}

impl<C> Clone for DataEntry<C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            handler: self.handler.clone(),
            explicit: self.explicit,
            key_weight: self.key_weight,
        }
    }
}

/// One method of one merged route.
pub(crate) struct RouteEntry<C> {
    pub(crate) method: Method,
    pub(crate) options: RouteOptions,
    pub(crate) handlers: Vec<SharedMiddleware<C>>,
    pub(crate) dataware: Vec<DataEntry<C>>,
    /// Dataware keys that apply to this route, innermost router first.
    pub(crate) pending: Vec<DataKey<C>>,
    pub(crate) paramware: HashMap<String, Vec<SharedParamHandler<C>>>,
    pub(crate) name: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) exclusions: HashSet<String>,
    pub(crate) defaults: HashMap<String, Option<DataValue>>,
    pub(crate) sort_overrides: HashMap<String, i32>,
}

impl<C> Clone for RouteEntry<C> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            options: self.options.clone(),
            handlers: self.handlers.clone(),
            dataware: self.dataware.clone(),
            pending: self.pending.clone(),
            paramware: self.paramware.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            exclusions: self.exclusions.clone(),
            defaults: self.defaults.clone(),
            sort_overrides: self.sort_overrides.clone(),
        }
    }
}

impl<C: Context> RouteEntry<C> {
    /// The value a dataware key sees: the route's own, else the inherited default.
    fn data_value(&self, key: &str) -> Option<&DataValue> {
        self.options
            .get_data(key)
            .or_else(|| self.defaults.get(key).and_then(Option::as_ref))
    }

    /// Run every queued constructor and return the route's dataware sorted
    /// by weight. Equal weights keep their queue order.
    pub(crate) fn build_dataware(
        &self,
        route: &MergedRoute<C>,
    ) -> Result<Vec<DataEntry<C>>, ConfigError> {
        let record = RouteRecord {
            method: self.method,
            path: route.pattern.as_str(),
            name: self.name.as_deref(),
            host: route.host.as_deref(),
            options: &self.options,
        };

        let mut entries = self.dataware.clone();
        for data_key in &self.pending {
            let Some(value) = self.data_value(&data_key.key) else {
                continue;
            };
            for ctor in &data_key.constructors {
                let built = ctor.build(value, record.path, &record).ok_or_else(|| {
                    ConfigError::DataType {
                        key: data_key.key.clone(),
                        expected: ctor.expected,
                        found: value.type_name(),
                    }
                })?;
                entries.extend(
                    built
                        .into_entries()
                        .into_iter()
                        .map(|(handler, explicit)| DataEntry {
                            key: data_key.key.clone(),
                            handler,
                            explicit,
                            key_weight: data_key.weight,
                        }),
                );
            }
        }
        entries.sort_by_key(|d| d.weight(&self.sort_overrides));
        Ok(entries)
    }
}

/// Every method registered for one host and path.
pub(crate) struct MergedRoute<C> {
    pub(crate) pattern: Pattern,
    pub(crate) host: Option<String>,
    pub(crate) entries: Vec<RouteEntry<C>>,
}

impl<C> MergedRoute<C> {
    /// Registered methods in listing order.
    pub(crate) fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<_> = self.entries.iter().map(|e| e.method).collect();
        methods.sort();
        methods
    }
}

/// Path-scoped middleware.
pub(crate) struct MergedMiddleware<C> {
    pub(crate) pattern: Pattern,
    pub(crate) host: Option<String>,
    pub(crate) handlers: Vec<SharedMiddleware<C>>,
}

/// Where a route name points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NameTarget {
    pub(crate) pattern: Pattern,
    pub(crate) host: Option<String>,
}

/// A router's merged view of its subtree.
pub(crate) struct Merged<C> {
    pub(crate) middleware: Vec<MergedMiddleware<C>>,
    pub(crate) routes: Vec<MergedRoute<C>>,
    pub(crate) names: BTreeMap<String, NameTarget>,
}

impl<C> Merged<C> {
    pub(crate) fn empty() -> Self {
        Self {
            middleware: Vec::new(),
            routes: Vec::new(),
            names: BTreeMap::new(),
        }
    }

    /// Number of (route, method) entries.
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn entry_count(&self) -> usize {
        self.routes.iter().map(|r| r.entries.len()).sum()
    }
}

/// Build a router's merged view. `view` yields each child's current view.
pub(crate) fn assemble<C: Context>(
    options: &RouterOptions<C>,
    raw: &Raw<C>,
    view: impl Fn(RouterId) -> Result<Arc<Merged<C>>, ConfigError>,
) -> Result<Merged<C>, ConfigError> {
    let prefix = options.prefix.as_deref().unwrap_or("");
    let own_host = options.host.as_deref();
    let explicit_hosts = explicit_hosts(prefix, raw)?;

    let mut table = RouteTable::new();
    let mut middleware = Vec::new();

    for registration in &raw.registrations {
        match registration {
            Registration::Use { paths, handlers } => {
                for path in paths {
                    middleware.push(MergedMiddleware {
                        pattern: Pattern::parse(&join_paths(prefix, path))?,
                        host: own_host.map(str::to_string),
                        handlers: handlers.clone(),
                    });
                }
            }
            Registration::Route(def) => {
                for (i, path) in def.paths.iter().enumerate() {
                    let full = join_paths(prefix, path);
                    let host = explicit_hosts.get(&full).map(String::as_str).or(own_host);
                    let pattern = Pattern::parse(&full)?;
                    for &method in &def.methods {
                        // A name binds to the first path of a registration.
                        table.insert(host, &pattern, own_entry(options, def, method, i == 0))?;
                    }
                }
            }
            Registration::Nest { paths, child } => {
                let child = view(*child)?;
                for path in paths {
                    let base = join_paths(prefix, path);
                    for mw in &child.middleware {
                        middleware.push(MergedMiddleware {
                            pattern: Pattern::parse(&join_paths(&base, mw.pattern.as_str()))?,
                            host: mw.host.clone().or_else(|| own_host.map(str::to_string)),
                            handlers: mw.handlers.clone(),
                        });
                    }
                    for route in &child.routes {
                        let pattern = Pattern::parse(&join_paths(&base, route.pattern.as_str()))?;
                        let host = route.host.as_deref().or(own_host);
                        for entry in &route.entries {
                            table.insert(host, &pattern, entry.clone())?;
                        }
                    }
                }
            }
        }
    }

    let mut routes = table.routes;
    for route in &mut routes {
        for entry in &mut route.entries {
            resolve(options, raw, &route.pattern, entry)?;
        }
    }
    let names = collect_names(&routes)?;

    Ok(Merged {
        middleware,
        routes,
        names,
    })
}

fn own_entry<C: Context>(
    options: &RouterOptions<C>,
    def: &RouteDef<C>,
    method: Method,
    named: bool,
) -> RouteEntry<C> {
    let mut entry = RouteEntry {
        method,
        options: def.options.clone(),
        handlers: def.handlers.clone(),
        dataware: Vec::new(),
        pending: Vec::new(),
        paramware: HashMap::new(),
        name: def.options.name.clone().filter(|_| named),
        namespace: None,
        exclusions: HashSet::new(),
        defaults: HashMap::new(),
        sort_overrides: HashMap::new(),
    };

    if def.mount {
        if options.policy.contains(Policy::MOUNT_MIDDLEWARE) {
            let handler = options
                .mount_middleware
                .clone()
                .unwrap_or_else(|| PathRewrite::new().shared());
            entry.dataware.push(DataEntry {
                key: MOUNT_KEY.to_string(),
                handler,
                explicit: Some(i32::MIN),
                key_weight: None,
            });
        }
        entry.exclusions.insert(MOUNT_KEY.to_string());
    }
    entry
}

fn resolve<C: Context>(
    options: &RouterOptions<C>,
    raw: &Raw<C>,
    pattern: &Pattern,
    entry: &mut RouteEntry<C>,
) -> Result<(), ConfigError> {
    if let Some(ns) = &options.name {
        entry.name = entry.name.take().map(|name| format!("{ns}.{name}"));
        entry.namespace = Some(match entry.namespace.take() {
            Some(inner) => format!("{ns}.{inner}"),
            None => ns.clone(),
        });
    }

    for name in pattern.param_names() {
        if let Some(handlers) = raw.paramware.get(name) {
            let list = entry.paramware.entry(name.to_string()).or_default();
            list.splice(0..0, handlers.iter().cloned());
        }
    }

    for (key, value) in &raw.defaults {
        entry
            .defaults
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    for (key, weight) in &raw.sort_overrides {
        entry.sort_overrides.entry(key.clone()).or_insert(*weight);
    }

    entry.pending.extend(
        raw.data_keys
            .iter()
            .filter(|k| !entry.exclusions.contains(&k.key))
            .cloned(),
    );
    for data_key in &entry.pending {
        let Some(value) = entry.data_value(&data_key.key) else {
            continue;
        };
        if let Some(ctor) = data_key.constructors.iter().find(|c| !c.accepts(value)) {
            return Err(ConfigError::DataType {
                key: data_key.key.clone(),
                expected: ctor.expected,
                found: value.type_name(),
            });
        }
    }
    entry.exclusions.extend(raw.exclusive.iter().cloned());
    Ok(())
}

/// First explicit host per own path; a second, different one is a conflict.
fn explicit_hosts<C>(prefix: &str, raw: &Raw<C>) -> Result<HashMap<String, String>, ConfigError> {
    let mut hosts: HashMap<String, String> = HashMap::new();
    for registration in &raw.registrations {
        let Registration::Route(def) = registration else {
            continue;
        };
        let Some(host) = &def.options.host else {
            continue;
        };
        for path in &def.paths {
            let full = join_paths(prefix, path);
            match hosts.get(&full) {
                Some(first) if !first.eq_ignore_ascii_case(host) => {
                    return Err(ConfigError::HostConflict {
                        path: full,
                        first: first.clone(),
                        second: host.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    hosts.insert(full, host.clone());
                }
            }
        }
    }
    Ok(hosts)
}

fn collect_names<C>(
    routes: &[MergedRoute<C>],
) -> Result<BTreeMap<String, NameTarget>, ConfigError> {
    let mut names: BTreeMap<String, NameTarget> = BTreeMap::new();
    for route in routes {
        for entry in &route.entries {
            let Some(name) = &entry.name else {
                continue;
            };
            let target = NameTarget {
                pattern: route.pattern.clone(),
                host: route.host.clone(),
            };
            match names.get(name) {
                Some(existing) if existing != &target => {
                    return Err(ConfigError::DuplicateName {
                        name: name.clone(),
                        existing: existing.pattern.as_str().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    names.insert(name.clone(), target);
                }
            }
        }
    }
    Ok(names)
}

/// Routes keyed by host and path, in first-insertion order.
struct RouteTable<C> {
    routes: Vec<MergedRoute<C>>,
    index: HashMap<(Option<String>, String), usize>,
}

impl<C> RouteTable<C> {
    fn new() -> Self {
        Self {
            routes: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(
        &mut self,
        host: Option<&str>,
        pattern: &Pattern,
        entry: RouteEntry<C>,
    ) -> Result<(), ConfigError> {
        let key = (
            host.map(str::to_ascii_lowercase),
            pattern.as_str().to_string(),
        );
        let index = match self.index.get(&key) {
            Some(&index) => index,
            None => {
                self.routes.push(MergedRoute {
                    pattern: pattern.clone(),
                    host: host.map(str::to_string),
                    entries: Vec::new(),
                });
                self.index.insert(key, self.routes.len() - 1);
                self.routes.len() - 1
            }
        };

        let route = &mut self.routes[index];
        if route.entries.iter().any(|e| e.method == entry.method) {
            return Err(ConfigError::DuplicateRoute {
                method: entry.method.to_string(),
                path: pattern.as_str().to_string(),
            });
        }
        route.entries.push(entry);
        Ok(())
    }
}
