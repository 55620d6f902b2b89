//! # Router Tree
//!
//! Routers live in an arena owned by [`RouterTree`] and refer to each other by
//! [`RouterId`]. Nesting records the child on the parent and a back-link on
//! the child; the back-links only tell a rebuild which ancestors to refresh.
//!
//! Every registration is atomic. The router's raw registrations are
//! snapshotted, the change is applied, and the router plus all of its
//! ancestors are reassembled into a staging area. Only when every affected
//! router assembled (and every live table compiled) is the result committed;
//! otherwise the snapshot is restored and nothing observable changes.
//!
//! ```rust,ignore
//! let mut tree = RouterTree::<Request>::new();
//! let api = tree.router(RouterOptions::new().name("v1"))?;
//! let shop = tree.router(RouterOptions::new().name("shop"))?;
//!
//! tree.router_mut(shop)?.get_with("/items", RouteOptions::named("list"), [list])?;
//! tree.router_mut(api)?.nest("/shop", shop)?;
//!
//! let dispatcher = tree.dispatcher(api)?;
//! dispatcher.call(&mut Request::new(Method::Get, "/shop/items")).await?;
//! ```

pub(crate) mod assemble;
mod handle;
pub(crate) mod node;

pub use handle::{IntoPaths, RouterMut};

use crate::{
    dispatch::{DispatchTable, Dispatcher, LiveTable, url::{NameRegistry, UrlScope}},
    options::{RouterOptions, UrlOptions},
};
use arc_swap::ArcSwap;
use assemble::{Merged, assemble};
use node::{Node, Raw};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};
use trellis_core::{ConfigError, Context, Method, Params, TrellisError};
use trellis_std::{HostPattern, Pattern};

/// Stable handle to a router in a [`RouterTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(usize);

impl RouterId {
    /// Arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One merged route, as listed by [`RouterTree::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Route method.
    pub method: Method,
    /// Merged path template.
    pub path: String,
    /// Effective host template.
    pub host: Option<String>,
    /// Fully-qualified name.
    pub name: Option<String>,
}

/// An arena of routers.
pub struct RouterTree<C> {
    nodes: Vec<Node<C>>,
    generation: u64,
}

impl<C: Context> RouterTree<C> {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generation: 0,
        }
    }

    /// Add a router. It starts out unattached.
    pub fn router(&mut self, options: RouterOptions<C>) -> Result<RouterId, ConfigError> {
        if let Some(prefix) = options.prefix.as_deref().filter(|p| !p.is_empty()) {
            Pattern::parse(prefix)?;
        }
        if let Some(host) = options.host.as_deref() {
            HostPattern::parse(host)?;
        }

        let id = RouterId(self.nodes.len());
        self.nodes.push(Node {
            options,
            raw: Raw::new(),
            parents: Vec::new(),
            merged: Arc::new(Merged::empty()),
            live: None,
        });
        Ok(id)
    }

    /// Registration handle for `id`.
    pub fn router_mut(&mut self, id: RouterId) -> Result<RouterMut<'_, C>, ConfigError> {
        self.node(id)?;
        Ok(RouterMut::new(self, id))
    }

    /// The options `id` was created with.
    pub fn options(&self, id: RouterId) -> Result<&RouterOptions<C>, ConfigError> {
        Ok(&self.node(id)?.options)
    }

    /// Number of routers in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every merged route of `id`, in registration order.
    pub fn routes(&self, id: RouterId) -> Result<Vec<RouteInfo>, ConfigError> {
        let merged = &self.node(id)?.merged;
        Ok(merged
            .routes
            .iter()
            .flat_map(|route| {
                route.entries.iter().map(move |entry| RouteInfo {
                    method: entry.method,
                    path: route.pattern.as_str().to_string(),
                    host: route.host.clone(),
                    name: entry.name.clone(),
                })
            })
            .collect())
    }

    /// The dispatch entry point for `id`.
    ///
    /// The first call makes `id` a live root: from then on every rebuild that
    /// touches it swaps a fresh table into all of its dispatchers.
    pub fn dispatcher(&mut self, id: RouterId) -> Result<Dispatcher<C>, ConfigError> {
        let generation = self.generation;
        let node = self.node_mut(id)?;
        let live = match &node.live {
            Some(live) => live.clone(),
            None => {
                let table = DispatchTable::build(&node.options, &node.merged, generation)?;
                let live: LiveTable<C> = Arc::new(ArcSwap::from_pointee(table));
                node.live = Some(live.clone());
                live
            }
        };
        Ok(Dispatcher::new(live))
    }

    /// Generate the URL of a named route as seen from router `id`.
    ///
    /// Relative names (`.list`) expand into the router's own name.
    pub fn url_for(
        &self,
        id: RouterId,
        name: &str,
        params: &Params,
        options: UrlOptions,
        source_host: Option<&str>,
        protocol: &str,
    ) -> Result<String, TrellisError> {
        let node = self.node(id)?;
        let registry = NameRegistry::compile(&node.merged.names)?;
        let default_host = node
            .options
            .host
            .as_deref()
            .filter(|host| !HostPattern::is_templated(host));
        let scope = UrlScope {
            namespace: node.options.name.as_deref(),
            default_host,
            source_host,
            protocol,
        };
        Ok(registry.generate(&scope, name, params, options)?)
    }

    fn node(&self, id: RouterId) -> Result<&Node<C>, ConfigError> {
        self.nodes.get(id.0).ok_or(ConfigError::UnknownRouter(id.0))
    }

    fn node_mut(&mut self, id: RouterId) -> Result<&mut Node<C>, ConfigError> {
        self.nodes.get_mut(id.0).ok_or(ConfigError::UnknownRouter(id.0))
    }

    /// Apply `change` to the raw registrations of `id` and rebuild, or leave
    /// everything as it was.
    pub(crate) fn mutate(
        &mut self,
        id: RouterId,
        change: impl FnOnce(&mut Raw<C>),
    ) -> Result<(), ConfigError> {
        let node = self.node_mut(id)?;
        let snapshot = node.raw.clone();
        change(&mut node.raw);

        if let Err(err) = self.rebuild(id) {
            #[cfg(feature = "tracing")]
            tracing::warn!(router = %id, error = %err, "registration rejected, rolling back");
            self.nodes[id.0].raw = snapshot;
            return Err(err);
        }
        Ok(())
    }

    /// Whether nesting `child` under `parent` would make a router its own
    /// ancestor.
    pub(crate) fn would_cycle(&self, parent: RouterId, child: RouterId) -> bool {
        let mut stack = vec![child];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == parent {
                return true;
            }
            if seen.insert(id) {
                if let Some(node) = self.nodes.get(id.0) {
                    stack.extend(node.raw.children());
                }
            }
        }
        false
    }

    pub(crate) fn link_parent(&mut self, child: RouterId, parent: RouterId) {
        if let Some(node) = self.nodes.get_mut(child.0) {
            if !node.parents.contains(&parent) {
                node.parents.push(parent);
            }
        }
    }

    /// Reassemble `id` and every ancestor, children before parents.
    fn rebuild(&mut self, id: RouterId) -> Result<(), ConfigError> {
        let affected = self.ancestors_of(id);
        let order = self.post_order(id, &affected);

        let mut staged: HashMap<RouterId, Arc<Merged<C>>> = HashMap::with_capacity(order.len());
        for &router in &order {
            let node = &self.nodes[router.0];
            let merged = assemble(&node.options, &node.raw, |child| {
                staged
                    .get(&child)
                    .cloned()
                    .or_else(|| self.nodes.get(child.0).map(|n| n.merged.clone()))
                    .ok_or(ConfigError::UnknownRouter(child.0))
            })?;
            staged.insert(router, Arc::new(merged));
        }

        let generation = self.generation + 1;
        let mut tables = Vec::new();
        for &router in &order {
            let node = &self.nodes[router.0];
            if let (Some(live), Some(merged)) = (&node.live, staged.get(&router)) {
                let table = DispatchTable::build(&node.options, merged, generation)?;
                tables.push((live.clone(), table));
            }
        }

        for (router, merged) in staged {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                router = %router,
                routes = merged.entry_count(),
                middleware = merged.middleware.len(),
                "router rebuilt"
            );
            self.nodes[router.0].merged = merged;
        }
        for (live, table) in tables {
            #[cfg(feature = "tracing")]
            tracing::debug!(generation, routes = table.route_count(), "dispatch table swapped");
            live.store(Arc::new(table));
        }
        self.generation = generation;
        Ok(())
    }

    /// `id` and all transitive parents.
    fn ancestors_of(&self, id: RouterId) -> HashSet<RouterId> {
        let mut affected = HashSet::new();
        let mut stack = vec![id];
        while let Some(router) = stack.pop() {
            if affected.insert(router) {
                stack.extend(self.nodes[router.0].parents.iter().copied());
            }
        }
        affected
    }

    /// Affected routers ordered so that every child precedes its parents.
    fn post_order(&self, id: RouterId, affected: &HashSet<RouterId>) -> Vec<RouterId> {
        let mut order = Vec::with_capacity(affected.len());
        let mut visited = HashSet::new();
        let mut roots: Vec<RouterId> = affected.iter().copied().collect();
        roots.sort();
        roots.retain(|r| *r != id);
        roots.insert(0, id);

        for root in roots {
            self.visit(root, affected, &mut visited, &mut order);
        }
        order
    }

    fn visit(
        &self,
        id: RouterId,
        affected: &HashSet<RouterId>,
        visited: &mut HashSet<RouterId>,
        order: &mut Vec<RouterId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        for child in self.nodes[id.0].raw.children() {
            if affected.contains(&child) {
                self.visit(child, affected, visited, order);
            }
        }
        order.push(id);
    }
}

impl<C: Context> Default for RouterTree<C> {
    fn default() -> Self {
        Self::new()
    }
}
