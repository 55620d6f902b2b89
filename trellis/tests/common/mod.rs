#![allow(dead_code)]

use trellis::{
    BoxError, BoxFuture, Composed, Context, Dataware, Dispatcher, Method, Middleware,
    MiddlewareExt, Next, ParamHandler, ParamHandlerExt, Params, Request, RouteRecord, Segment,
    SharedMiddleware, SharedParamHandler, UrlFor, UrlOptions, compose,
};

use trellis::testing::{Recorder, record, respond};

// ============================================================================
// Erasure helpers
// ============================================================================

pub fn mw(middleware: impl Middleware<Request>) -> SharedMiddleware<Request> {
    middleware.shared()
}

pub fn pw(handler: impl ParamHandler<Request>) -> SharedParamHandler<Request> {
    handler.shared_param()
}

pub fn get(path: &str) -> Request {
    Request::new(Method::Get, path)
}

pub fn req(method: Method, path: &str) -> Request {
    Request::new(method, path)
}

/// `dispatcher`, then a fallback that records `"fallback"`.
pub fn with_fallback(dispatcher: &Dispatcher<Request>, rec: &Recorder) -> Composed<Request> {
    compose([
        Segment::from(mw(dispatcher.clone())),
        Segment::from(mw(respond("fallback", rec))),
    ])
}

// ============================================================================
// Dataware constructors
// ============================================================================

/// A constructor recording `"{label}={value}"` when its handler runs.
pub fn tag(
    label: &'static str,
    rec: &Recorder,
) -> impl Fn(&u32, &str, &RouteRecord<'_>) -> Dataware<Request> + Send + Sync + 'static {
    let rec = rec.clone();
    move |value: &u32, _path: &str, _route: &RouteRecord<'_>| {
        Dataware::single(mw(record(format!("{label}={value}"), &rec)))
    }
}

/// Like [`tag`], for flag-valued keys.
pub fn flag(
    label: &'static str,
    rec: &Recorder,
) -> impl Fn(&bool, &str, &RouteRecord<'_>) -> Dataware<Request> + Send + Sync + 'static {
    let rec = rec.clone();
    move |enabled: &bool, _path: &str, _route: &RouteRecord<'_>| {
        if *enabled {
            Dataware::single(mw(record(label, &rec)))
        } else {
            Dataware::None
        }
    }
}

// ============================================================================
// Inspectors
// ============================================================================

/// Records `"name=value"` for each listed parameter, then continues.
pub struct ParamEcho {
    pub names: Vec<&'static str>,
    pub rec: Recorder,
}

impl Middleware<Request> for ParamEcho {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut Request,
        next: Next<'a, Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            for name in &self.names {
                let value = ctx.params().get(name).unwrap_or("-");
                self.rec.push(format!("{name}={value}"));
            }
            next.run(ctx).await
        })
    }
}

pub fn params_of(names: &[&'static str], rec: &Recorder) -> SharedMiddleware<Request> {
    mw(ParamEcho {
        names: names.to_vec(),
        rec: rec.clone(),
    })
}

/// Records the URL generated for a route name from inside a handler.
pub struct UrlEcho {
    pub name: &'static str,
    pub params: Params,
    pub options: UrlOptions,
    pub rec: Recorder,
}

impl Middleware<Request> for UrlEcho {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut Request,
        _next: Next<'a, Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let helper = ctx.extensions().get::<UrlFor>().ok_or("no url helper")?;
            let url = helper.url_for(self.name, &self.params, self.options)?;
            self.rec.push(url);
            Ok::<(), BoxError>(())
        })
    }
}

pub fn url_of(name: &'static str, params: Params, rec: &Recorder) -> SharedMiddleware<Request> {
    mw(UrlEcho {
        name,
        params,
        options: UrlOptions::new(),
        rec: rec.clone(),
    })
}
