mod common;

use common::{get, mw};
use trellis::testing::{Recorder, record, respond};
use trellis::{ConfigError, Method, Request, RouteOptions, RouterOptions, RouterTree};

#[tokio::test]
async fn test_live_dispatcher_sees_new_routes() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let child = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root).unwrap().nest("/c", child).unwrap();

    let dispatcher = tree.dispatcher(root).unwrap();
    let before = dispatcher.generation();
    dispatcher.call(&mut get("/c/new")).await.unwrap();
    assert!(rec.is_empty());

    // Registering on the child rebuilds the live parent.
    tree.router_mut(child)
        .unwrap()
        .get("/new", [mw(respond("new", &rec))])
        .unwrap();
    assert!(dispatcher.generation() > before);

    dispatcher.call(&mut get("/c/new")).await.unwrap();
    assert_eq!(rec.take(), ["new"]);

    // A second dispatcher shares the same live table.
    let again = tree.dispatcher(root).unwrap();
    assert_eq!(again.generation(), dispatcher.generation());
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let leaf = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_middleware([mw(record("mw", &rec))])
        .unwrap()
        .nest("/leaf", leaf)
        .unwrap();
    tree.router_mut(leaf)
        .unwrap()
        .get("/x", [mw(respond("x", &rec))])
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/leaf/x")).await.unwrap();
    let first = rec.take();
    let routes = tree.routes(root).unwrap();

    // A registration that changes nothing observable for `/leaf/x`.
    tree.router_mut(leaf).unwrap().sort_data("unused", 3).unwrap();
    dispatcher.call(&mut get("/leaf/x")).await.unwrap();
    assert_eq!(rec.take(), first);
    assert_eq!(tree.routes(root).unwrap(), routes);
}

#[tokio::test]
async fn test_rejected_change_keeps_live_table() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let child = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root)
        .unwrap()
        .get("/c/x", [mw(respond("root", &rec))])
        .unwrap()
        .nest("/c", child)
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();
    let generation = dispatcher.generation();

    // `/c/x` already exists on the parent, so the parent rebuild fails.
    let err = tree
        .router_mut(child)
        .unwrap()
        .get("/x", [mw(respond("child", &rec))])
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::DuplicateRoute {
            method: "GET".to_string(),
            path: "/c/x".to_string(),
        }
    );
    assert!(tree.routes(child).unwrap().is_empty());
    assert_eq!(dispatcher.generation(), generation);

    dispatcher.call(&mut get("/c/x")).await.unwrap();
    assert_eq!(rec.take(), ["root"]);
}

#[test]
fn test_host_conflict() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let mut router = tree.router_mut(root).unwrap();
    router
        .get_with("/x", RouteOptions::new().host("a.example.com"), [mw(respond("a", &rec))])
        .unwrap();

    let err = router
        .post_with("/x", RouteOptions::new().host("b.example.com"), [mw(respond("b", &rec))])
        .unwrap_err();
    assert!(matches!(err, ConfigError::HostConflict { .. }));

    // The host declared first also covers entries that declare none.
    router.put("/x", [mw(respond("put", &rec))]).unwrap();
    let routes = tree.routes(root).unwrap();
    assert!(
        routes
            .iter()
            .all(|r| r.host.as_deref() == Some("a.example.com"))
    );
    assert_eq!(
        routes.iter().map(|r| r.method).collect::<Vec<_>>(),
        [Method::Get, Method::Put]
    );
}

#[test]
fn test_diamond_nesting() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let left = tree.router(RouterOptions::new()).unwrap();
    let right = tree.router(RouterOptions::new()).unwrap();
    let shared = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(left).unwrap().nest("/s", shared).unwrap();
    tree.router_mut(right).unwrap().nest("/s", shared).unwrap();
    tree.router_mut(root)
        .unwrap()
        .nest("/l", left)
        .unwrap()
        .nest("/r", right)
        .unwrap();
    tree.router_mut(shared)
        .unwrap()
        .get("/x", [mw(respond("x", &rec))])
        .unwrap();

    let paths: Vec<_> = tree
        .routes(root)
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect();
    assert_eq!(paths, ["/l/s/x", "/r/s/x"]);
}
