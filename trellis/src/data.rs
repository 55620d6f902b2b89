//! # Dataware
//!
//! Dataware is middleware synthesized from declarative data attached to a
//! route. A router registers constructors for a data key; every route below
//! that router carrying a value for the key (directly, or through a default)
//! gets the constructor's output spliced into its chain.
//!
//! Constructors run when a live table is built, so a default set on any
//! ancestor of the registering router is seen as well.
//!
//! ```rust,ignore
//! router.use_data("cache", |seconds: &u32, _path, _route| {
//!     Dataware::single(CacheFor(*seconds).shared())
//! })?;
//! router.default_data("cache", 60u32)?;
//! router.get_with("/users/:id", RouteOptions::new().data("cache", 5u32), [show])?;
//! ```

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    sync::Arc,
};
use trellis_core::{Method, SharedMiddleware};

/// A type-erased dataware value.
#[derive(Clone)]
pub struct DataValue {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl DataValue {
    /// Erase a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Borrow the value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Name of the erased type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataValue").field(&self.type_name).finish()
    }
}

/// What a dataware constructor yields for one route.
///
/// Each handler may carry an explicit sort weight; it takes precedence over
/// the sort override and the weight registered for the key.
pub enum Dataware<C> {
    /// Nothing for this route.
    None,
    /// One handler.
    Single(SharedMiddleware<C>, Option<i32>),
    /// Several handlers, in order.
    Many(Vec<(SharedMiddleware<C>, Option<i32>)>),
}

impl<C> Dataware<C> {
    /// One handler with no explicit weight.
    pub fn single(handler: SharedMiddleware<C>) -> Self {
        Dataware::Single(handler, None)
    }

    /// One handler with an explicit weight.
    pub fn weighted(handler: SharedMiddleware<C>, weight: i32) -> Self {
        Dataware::Single(handler, Some(weight))
    }

    /// Flatten into `(handler, weight)` pairs.
    pub fn into_entries(self) -> Vec<(SharedMiddleware<C>, Option<i32>)> {
        match self {
            Dataware::None => Vec::new(),
            Dataware::Single(handler, weight) => vec![(handler, weight)],
            Dataware::Many(entries) => entries,
        }
    }
}

impl<C> From<SharedMiddleware<C>> for Dataware<C> {
    fn from(handler: SharedMiddleware<C>) -> Self {
        Dataware::single(handler)
    }
}

impl<C> From<Vec<SharedMiddleware<C>>> for Dataware<C> {
    fn from(handlers: Vec<SharedMiddleware<C>>) -> Self {
        Dataware::Many(handlers.into_iter().map(|h| (h, None)).collect())
    }
}

/// The route a dataware constructor is building for.
#[derive(Debug, Clone, Copy)]
pub struct RouteRecord<'r> {
    /// The route method.
    pub method: Method,
    /// The full route path.
    pub path: &'r str,
    /// The fully namespaced route name.
    pub name: Option<&'r str>,
    /// The route's effective host.
    pub host: Option<&'r str>,
    /// The options the route was registered with.
    pub options: &'r crate::RouteOptions,
}

type BuildFn<C> =
    dyn Fn(&DataValue, &str, &RouteRecord<'_>) -> Option<Dataware<C>> + Send + Sync;

/// A constructor with its value type erased.
pub(crate) struct Constructor<C> {
    pub(crate) expected: &'static str,
    expected_type: TypeId,
    build: Arc<BuildFn<C>>,
}

impl<C: 'static> Constructor<C> {
    pub(crate) fn new<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &str, &RouteRecord<'_>) -> Dataware<C> + Send + Sync + 'static,
    {
        Self {
            expected: type_name::<T>(),
            expected_type: TypeId::of::<T>(),
            build: Arc::new(move |value: &DataValue, path: &str, route: &RouteRecord<'_>| {
                value.downcast_ref::<T>().map(|v| f(v, path, route))
            }),
        }
    }

    /// Whether `value` has the registered type.
    pub(crate) fn accepts(&self, value: &DataValue) -> bool {
        value.type_id == self.expected_type
    }

    /// `None` when `value` is not of the registered type.
    pub(crate) fn build(
        &self,
        value: &DataValue,
        path: &str,
        route: &RouteRecord<'_>,
    ) -> Option<Dataware<C>> {
        (self.build)(value, path, route)
    }
}

impl<C> Clone for Constructor<C> {
    fn clone(&self) -> Self {
        Self {
            expected: self.expected,
            expected_type: self.expected_type,
            build: self.build.clone(),
        }
    }
}
