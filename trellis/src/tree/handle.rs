//! Registration handle.

use crate::{
    data::{Constructor, DataValue, Dataware, RouteRecord},
    dispatch::Dispatcher,
    options::RouteOptions,
    tree::{
        RouterId, RouterTree,
        node::{Registration, RouteDef},
    },
};
use std::{any::Any, fmt};
use trellis_core::{ConfigError, Context, Method, SharedMiddleware, SharedParamHandler};
use trellis_std::{HostPattern, MOUNT_PARAM, Pattern, pattern::join_paths};

/// One path or a list of paths.
pub trait IntoPaths {
    /// The paths, in order.
    fn into_paths(self) -> Vec<String>;
}

impl IntoPaths for &str {
    fn into_paths(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPaths for String {
    fn into_paths(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPaths for &String {
    fn into_paths(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoPaths for Vec<String> {
    fn into_paths(self) -> Vec<String> {
        self
    }
}

impl IntoPaths for Vec<&str> {
    fn into_paths(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoPaths for &[&str] {
    fn into_paths(self) -> Vec<String> {
        self.iter().map(|p| p.to_string()).collect()
    }
}

impl<const N: usize> IntoPaths for [&str; N] {
    fn into_paths(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

/// Mutable access to one router of a [`RouterTree`].
///
/// Every method applies one registration and rebuilds the router and its
/// ancestors before returning. On error the registration is discarded.
pub struct RouterMut<'t, C> {
    tree: &'t mut RouterTree<C>,
    id: RouterId,
}

impl<C> fmt::Debug for RouterMut<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterMut")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

macro_rules! verbs {
    ($($name:ident, $with:ident => $method:expr;)*) => {
        $(
            #[doc = concat!("Register `", stringify!($name), "` handlers for `paths`.")]
            pub fn $name(
                &mut self,
                paths: impl IntoPaths,
                handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
            ) -> Result<&mut Self, ConfigError> {
                self.register($method, paths, RouteOptions::new(), handlers)
            }

            #[doc = concat!("Like [`Self::", stringify!($name), "`], with route options.")]
            pub fn $with(
                &mut self,
                paths: impl IntoPaths,
                options: RouteOptions,
                handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
            ) -> Result<&mut Self, ConfigError> {
                self.register($method, paths, options, handlers)
            }
        )*
    };
}

impl<'t, C: Context> RouterMut<'t, C> {
    pub(crate) fn new(tree: &'t mut RouterTree<C>, id: RouterId) -> Self {
        Self { tree, id }
    }

    /// The router being edited.
    pub fn id(&self) -> RouterId {
        self.id
    }

    verbs! {
        get, get_with => [Method::Get];
        head, head_with => [Method::Head];
        post, post_with => [Method::Post];
        put, put_with => [Method::Put];
        patch, patch_with => [Method::Patch];
        delete, delete_with => [Method::Delete];
        options, options_with => [Method::Options];
        all, all_with => Method::ALL;
    }

    /// Register `handlers` for every method in `methods` on every path.
    pub fn register(
        &mut self,
        methods: impl IntoIterator<Item = Method>,
        paths: impl IntoPaths,
        options: RouteOptions,
        handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
    ) -> Result<&mut Self, ConfigError> {
        let def = RouteDef {
            methods: methods.into_iter().collect(),
            paths: validate(paths)?,
            options: validate_options(options)?,
            handlers: handlers.into_iter().collect(),
            mount: false,
        };
        self.tree
            .mutate(self.id, |raw| raw.registrations.push(Registration::Route(def)))?;
        Ok(self)
    }

    /// Middleware for every request this router sees.
    pub fn use_middleware(
        &mut self,
        handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
    ) -> Result<&mut Self, ConfigError> {
        self.use_at("/", handlers)
    }

    /// Middleware for requests under `paths`.
    pub fn use_at(
        &mut self,
        paths: impl IntoPaths,
        handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
    ) -> Result<&mut Self, ConfigError> {
        let paths = validate(paths)?;
        let handlers = handlers.into_iter().collect();
        self.tree
            .mutate(self.id, |raw| raw.registrations.push(Registration::Use { paths, handlers }))?;
        Ok(self)
    }

    /// Nest `child` under `paths`. The child keeps its own registrations and
    /// may be nested in several places.
    pub fn nest(&mut self, paths: impl IntoPaths, child: RouterId) -> Result<&mut Self, ConfigError> {
        self.tree.node(child)?;
        if self.tree.would_cycle(self.id, child) {
            return Err(ConfigError::Cycle {
                parent: self.id.0,
                child: child.0,
            });
        }
        let paths = validate(paths)?;
        self.tree
            .mutate(self.id, |raw| raw.registrations.push(Registration::Nest { paths, child }))?;
        self.tree.link_parent(child, self.id);
        Ok(self)
    }

    /// Hand everything under `paths` to `handlers`, which see the remainder
    /// of the path as the request path.
    pub fn mount(
        &mut self,
        paths: impl IntoPaths,
        handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
    ) -> Result<&mut Self, ConfigError> {
        self.mount_with(paths, RouteOptions::new(), handlers)
    }

    /// Like [`Self::mount`], with route options.
    pub fn mount_with(
        &mut self,
        paths: impl IntoPaths,
        options: RouteOptions,
        handlers: impl IntoIterator<Item = SharedMiddleware<C>>,
    ) -> Result<&mut Self, ConfigError> {
        let mut expanded = Vec::new();
        for path in validate(paths)? {
            let rest = join_paths(&path, &format!("/*{MOUNT_PARAM}"));
            Pattern::parse(&rest)?;
            expanded.push(path);
            expanded.push(rest);
        }
        let def = RouteDef {
            methods: Method::ALL.to_vec(),
            paths: expanded,
            options: validate_options(options)?,
            handlers: handlers.into_iter().collect(),
            mount: true,
        };
        self.tree
            .mutate(self.id, |raw| raw.registrations.push(Registration::Route(def)))?;
        Ok(self)
    }

    /// Register a dataware constructor for `key`.
    ///
    /// Routes at or below this router carrying a `T` for `key` get the
    /// constructor's output in their chain.
    pub fn use_data<T, F>(&mut self, key: &str, constructor: F) -> Result<&mut Self, ConfigError>
    where
        T: Any + Send + Sync,
        F: Fn(&T, &str, &RouteRecord<'_>) -> Dataware<C> + Send + Sync + 'static,
    {
        let constructor = Constructor::new(constructor);
        self.tree
            .mutate(self.id, |raw| raw.data_key_mut(key).constructors.push(constructor))?;
        Ok(self)
    }

    /// Like [`Self::use_data`], also setting the key's sort weight.
    pub fn use_data_weighted<T, F>(
        &mut self,
        key: &str,
        weight: i32,
        constructor: F,
    ) -> Result<&mut Self, ConfigError>
    where
        T: Any + Send + Sync,
        F: Fn(&T, &str, &RouteRecord<'_>) -> Dataware<C> + Send + Sync + 'static,
    {
        let constructor = Constructor::new(constructor);
        self.tree.mutate(self.id, |raw| {
            let data_key = raw.data_key_mut(key);
            data_key.weight = Some(weight);
            data_key.constructors.push(constructor);
        })?;
        Ok(self)
    }

    /// Value for `key` on routes at or below this router that carry none.
    pub fn default_data<T: Any + Send + Sync>(
        &mut self,
        key: &str,
        value: T,
    ) -> Result<&mut Self, ConfigError> {
        let value = DataValue::new(value);
        self.tree.mutate(self.id, |raw| {
            raw.defaults.insert(key.to_string(), Some(value));
        })?;
        Ok(self)
    }

    /// Stop defaults for `key` set on ancestors from reaching this router.
    pub fn clear_default_data(&mut self, key: &str) -> Result<&mut Self, ConfigError> {
        self.tree.mutate(self.id, |raw| {
            raw.defaults.insert(key.to_string(), None);
        })?;
        Ok(self)
    }

    /// Override the sort weight of `key` for routes at or below this router.
    pub fn sort_data(&mut self, key: &str, weight: i32) -> Result<&mut Self, ConfigError> {
        self.tree.mutate(self.id, |raw| {
            raw.sort_overrides.insert(key.to_string(), weight);
        })?;
        Ok(self)
    }

    /// While set, dataware for `key` registered on ancestors never applies
    /// to routes at or below this router.
    pub fn set_data_exclusive(&mut self, key: &str, exclusive: bool) -> Result<&mut Self, ConfigError> {
        self.tree.mutate(self.id, |raw| {
            if exclusive {
                raw.exclusive.insert(key.to_string());
            } else {
                raw.exclusive.remove(key);
            }
        })?;
        Ok(self)
    }

    /// Paramware for routes with a `name` parameter.
    pub fn param(
        &mut self,
        name: &str,
        handlers: impl IntoIterator<Item = SharedParamHandler<C>>,
    ) -> Result<&mut Self, ConfigError> {
        let handlers: Vec<_> = handlers.into_iter().collect();
        self.tree.mutate(self.id, |raw| {
            raw.paramware
                .entry(name.to_string())
                .or_default()
                .extend(handlers);
        })?;
        Ok(self)
    }

    /// The dispatch entry point of this router.
    pub fn middleware(&mut self) -> Result<Dispatcher<C>, ConfigError> {
        self.tree.dispatcher(self.id)
    }
}

fn validate(paths: impl IntoPaths) -> Result<Vec<String>, ConfigError> {
    let paths = paths.into_paths();
    if paths.is_empty() {
        return Err(ConfigError::InvalidPath(String::new()));
    }
    for path in &paths {
        Pattern::parse(path)?;
    }
    Ok(paths)
}

fn validate_options(options: RouteOptions) -> Result<RouteOptions, ConfigError> {
    if let Some(host) = &options.host {
        HostPattern::parse(host)?;
    }
    if options.name.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::InvalidPattern {
            pattern: String::new(),
            reason: "empty route name".to_string(),
        });
    }
    Ok(options)
}
