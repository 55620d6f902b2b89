mod common;

use common::{get, mw};
use trellis::testing::{Recorder, fail, record, respond};
use trellis::{
    BoxError, BoxFuture, Context, MatchedRoute, Middleware, Next, RouteOptions, RouterOptions,
    RouterTree, Request, UrlFor,
};

#[tokio::test]
async fn test_mount_rewrites_and_restores() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_middleware([mw(record("outer", &rec).with_path())])
        .unwrap()
        .mount("/api", [mw(respond("api", &rec).with_path())])
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    let mut request = get("/api/widgets/1");
    dispatcher.call(&mut request).await.unwrap();
    assert_eq!(rec.take(), ["outer /api/widgets/1", "api /widgets/1"]);
    assert_eq!(request.path(), "/api/widgets/1");

    let mut request = get("/api");
    dispatcher.call(&mut request).await.unwrap();
    assert_eq!(rec.take(), ["outer /api", "api /"]);
    assert_eq!(request.path(), "/api");
}

#[tokio::test]
async fn test_mount_restores_on_error() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root)
        .unwrap()
        .mount(
            "/static",
            [mw(record("seen", &rec).with_path()), mw(fail("disk error"))],
        )
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    let mut request = get("/static/css/site.css");
    let err = dispatcher.call(&mut request).await.unwrap_err();
    assert_eq!(err.to_string(), "disk error");
    assert_eq!(rec.take(), ["seen /css/site.css"]);
    assert_eq!(request.path(), "/static/css/site.css");
}

#[tokio::test]
async fn test_mount_without_rewrite() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree
        .router(RouterOptions::new().disable_mount_middleware())
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .mount("/api", [mw(respond("api", &rec).with_path())])
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/api/widgets")).await.unwrap();
    assert_eq!(rec.take(), ["api /api/widgets"]);
}

#[tokio::test]
async fn test_nested_mount_sees_suffix_only() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let files = tree.router(RouterOptions::new().name("files")).unwrap();

    tree.router_mut(files)
        .unwrap()
        .mount_with(
            "/raw",
            RouteOptions::named("raw"),
            [mw(respond("raw", &rec).with_path())],
        )
        .unwrap();
    tree.router_mut(root).unwrap().nest("/files", files).unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher
        .call(&mut get("/files/raw/a/b.txt"))
        .await
        .unwrap();
    assert_eq!(rec.take(), ["raw /a/b.txt"]);

    let routes = tree.routes(root).unwrap();
    assert!(routes.iter().any(|r| r.name.as_deref() == Some("files.raw") && r.path == "/files/raw"));
}

/// Records which helper and matched route are visible around `next`.
struct Surroundings {
    rec: Recorder,
}

impl Surroundings {
    fn snapshot(&self, ctx: &Request) -> String {
        let helper = ctx.extensions().get::<UrlFor>().is_some();
        let path = ctx
            .extensions()
            .get::<MatchedRoute>()
            .map_or("-", |m| m.path.as_str());
        format!("helper={helper} route={path}")
    }
}

impl Middleware<Request> for Surroundings {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut Request,
        next: Next<'a, Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            self.rec.push(self.snapshot(ctx));
            next.run(ctx).await?;
            self.rec.push(self.snapshot(ctx));
            Ok::<(), BoxError>(())
        })
    }
}

#[tokio::test]
async fn test_mounted_dispatcher_hands_back_outer_values() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let outer = tree.router(RouterOptions::new()).unwrap();
    let inner = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(inner)
        .unwrap()
        .get("/users", [mw(respond("users", &rec).with_path())])
        .unwrap();
    let inner_dispatcher = tree.dispatcher(inner).unwrap();

    tree.router_mut(outer)
        .unwrap()
        .use_middleware([mw(Surroundings { rec: rec.clone() })])
        .unwrap()
        .mount("/api", [mw(inner_dispatcher.clone())])
        .unwrap();
    let outer_dispatcher = tree.dispatcher(outer).unwrap();

    outer_dispatcher.call(&mut get("/api/users")).await.unwrap();
    let entries = rec.take();
    assert_eq!(entries.len(), 3);
    assert!(entries[0].starts_with("helper=true route=/api"));
    assert_eq!(entries[1], "users /users");
    assert_eq!(entries[2], entries[0]);

    assert_eq!(outer_dispatcher.idle_helpers(), 1);
    assert_eq!(inner_dispatcher.idle_helpers(), 1);
}
