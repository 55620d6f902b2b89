//! Raw per-router registrations.

use crate::{
    data::{Constructor, DataValue},
    options::{RouteOptions, RouterOptions},
    tree::{RouterId, assemble::Merged},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use trellis_core::{Method, SharedMiddleware, SharedParamHandler};

/// One route registration.
pub(crate) struct RouteDef<C> {
    pub(crate) methods: Vec<Method>,
    pub(crate) paths: Vec<String>,
    pub(crate) options: RouteOptions,
    pub(crate) handlers: Vec<SharedMiddleware<C>>,
    pub(crate) mount: bool,
}

impl<C> Clone for RouteDef<C> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
            paths: self.paths.clone(),
            options: self.options.clone(),
            handlers: self.handlers.clone(),
            mount: self.mount,
        }
    }
}

/// Routes, middleware and nested routers, in registration order.
pub(crate) enum Registration<C> {
    Route(RouteDef<C>),
    Use {
        paths: Vec<String>,
        handlers: Vec<SharedMiddleware<C>>,
    },
    Nest {
        paths: Vec<String>,
        child: RouterId,
    },
}

impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        match self {
            Registration::Route(def) => Registration::Route(def.clone()),
            Registration::Use { paths, handlers } => Registration::Use {
                paths: paths.clone(),
                handlers: handlers.clone(),
            },
            Registration::Nest { paths, child } => Registration::Nest {
                paths: paths.clone(),
                child: *child,
            },
        }
    }
}

/// Constructors registered for one data key.
pub(crate) struct DataKey<C> {
    pub(crate) key: String,
    pub(crate) weight: Option<i32>,
    pub(crate) constructors: Vec<Constructor<C>>,
}

impl<C> Clone for DataKey<C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            weight: self.weight,
            constructors: self.constructors.clone(),
        }
    }
}

/// Everything a router was told, and nothing derived from it.
pub(crate) struct Raw<C> {
    pub(crate) registrations: Vec<Registration<C>>,
    pub(crate) paramware: HashMap<String, Vec<SharedParamHandler<C>>>,
    /// First-definition order.
    pub(crate) data_keys: Vec<DataKey<C>>,
    /// `None` blocks an inherited default.
    pub(crate) defaults: HashMap<String, Option<DataValue>>,
    pub(crate) sort_overrides: HashMap<String, i32>,
    pub(crate) exclusive: HashSet<String>,
}

impl<C> Raw<C> {
    pub(crate) fn new() -> Self {
        Self {
            registrations: Vec::new(),
            paramware: HashMap::new(),
            data_keys: Vec::new(),
            defaults: HashMap::new(),
            sort_overrides: HashMap::new(),
            exclusive: HashSet::new(),
        }
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.registrations.iter().filter_map(|reg| match reg {
            Registration::Nest { child, .. } => Some(*child),
            _ => None,
        })
    }

    pub(crate) fn data_key_mut(&mut self, key: &str) -> &mut DataKey<C> {
        let index = match self.data_keys.iter().position(|k| k.key == key) {
            Some(index) => index,
            None => {
                self.data_keys.push(DataKey {
                    key: key.to_string(),
                    weight: None,
                    constructors: Vec::new(),
                });
                self.data_keys.len() - 1
            }
        };
        &mut self.data_keys[index]
    }
}

impl<C> Clone for Raw<C> {
    fn clone(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
            paramware: self.paramware.clone(),
            data_keys: self.data_keys.clone(),
            defaults: self.defaults.clone(),
            sort_overrides: self.sort_overrides.clone(),
            exclusive: self.exclusive.clone(),
        }
    }
}

/// A router in the arena.
pub(crate) struct Node<C> {
    pub(crate) options: RouterOptions<C>,
    pub(crate) raw: Raw<C>,
    pub(crate) parents: Vec<RouterId>,
    pub(crate) merged: Arc<Merged<C>>,
    pub(crate) live: Option<crate::dispatch::LiveTable<C>>,
}
