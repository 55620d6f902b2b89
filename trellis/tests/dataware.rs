mod common;

use common::{flag, get, mw, tag};
use trellis::testing::{Recorder, record, respond};
use trellis::{
    ConfigError, Dataware, Request, RouteOptions, RouteRecord, RouterOptions, RouterTree,
};

#[tokio::test]
async fn test_default_and_override() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_data("cache", tag("cache", &rec))
        .unwrap()
        .default_data("cache", 60u32)
        .unwrap()
        .get("/user/:id", [mw(respond("user", &rec))])
        .unwrap()
        .get_with(
            "/hot/:id",
            RouteOptions::new().data("cache", 5u32),
            [mw(respond("hot", &rec))],
        )
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/user/5")).await.unwrap();
    assert_eq!(rec.take(), ["cache=60", "user"]);

    dispatcher.call(&mut get("/hot/5")).await.unwrap();
    assert_eq!(rec.take(), ["cache=5", "hot"]);
}

#[tokio::test]
async fn test_inherited_defaults_most_specific_wins() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let fast = tree.router(RouterOptions::new()).unwrap();
    let plain = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(fast)
        .unwrap()
        .default_data("cache", 1u32)
        .unwrap()
        .get("/a", [mw(respond("fast", &rec))])
        .unwrap();
    tree.router_mut(plain)
        .unwrap()
        .clear_default_data("cache")
        .unwrap()
        .get("/b", [mw(respond("plain", &rec))])
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_data("cache", tag("cache", &rec))
        .unwrap()
        .default_data("cache", 60u32)
        .unwrap()
        .nest("/fast", fast)
        .unwrap()
        .nest("/plain", plain)
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/fast/a")).await.unwrap();
    assert_eq!(rec.take(), ["cache=1", "fast"]);

    dispatcher.call(&mut get("/plain/b")).await.unwrap();
    assert_eq!(rec.take(), ["plain"]);
}

#[tokio::test]
async fn test_ancestor_default_activates_descendant_constructor() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let child = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(child)
        .unwrap()
        .use_data("cache", tag("cache", &rec))
        .unwrap()
        .get("/user/:id", [mw(respond("user", &rec))])
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .default_data("cache", 60u32)
        .unwrap()
        .nest("/c", child)
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/c/user/5")).await.unwrap();
    assert_eq!(rec.take(), ["cache=60", "user"]);
}

#[test]
fn test_ancestor_default_of_wrong_type_is_rejected() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let child = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(child)
        .unwrap()
        .use_data("cache", tag("cache", &rec))
        .unwrap()
        .get("/user/:id", [mw(respond("user", &rec))])
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .nest("/c", child)
        .unwrap();

    let err = tree
        .router_mut(root)
        .unwrap()
        .default_data("cache", "sixty")
        .unwrap_err();
    assert!(matches!(err, ConfigError::DataType { ref key, .. } if key == "cache"));
}

#[tokio::test]
async fn test_exclusive_key_blocks_ancestors() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let admin = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(admin)
        .unwrap()
        .use_data("auth", flag("admin-auth", &rec))
        .unwrap()
        .set_data_exclusive("auth", true)
        .unwrap()
        .get_with(
            "/panel",
            RouteOptions::new().data("auth", true),
            [mw(respond("panel", &rec))],
        )
        .unwrap()
        .get("/open", [mw(respond("open", &rec))])
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_data("auth", flag("root-auth", &rec))
        .unwrap()
        .default_data("auth", true)
        .unwrap()
        .get("/home", [mw(respond("home", &rec))])
        .unwrap()
        .nest("/admin", admin)
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/home")).await.unwrap();
    assert_eq!(rec.take(), ["root-auth", "home"]);

    dispatcher.call(&mut get("/admin/panel")).await.unwrap();
    assert_eq!(rec.take(), ["admin-auth", "panel"]);

    // The root default would qualify this route, but the key is exclusive.
    dispatcher.call(&mut get("/admin/open")).await.unwrap();
    assert_eq!(rec.take(), ["open"]);

    // Lifting exclusivity lets the ancestor apply again.
    tree.router_mut(admin)
        .unwrap()
        .set_data_exclusive("auth", false)
        .unwrap();
    dispatcher.call(&mut get("/admin/open")).await.unwrap();
    assert_eq!(rec.take(), ["root-auth", "open"]);
}

#[tokio::test]
async fn test_sort_weights() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let child = tree.router(RouterOptions::new()).unwrap();

    tree.router_mut(child)
        .unwrap()
        .sort_data("late", -5)
        .unwrap()
        .get("/x", [mw(respond("x", &rec))])
        .unwrap();
    tree.router_mut(root)
        .unwrap()
        .use_data_weighted("late", 10, tag("late", &rec))
        .unwrap()
        .use_data("early", tag("early", &rec))
        .unwrap()
        .default_data("late", 1u32)
        .unwrap()
        .default_data("early", 2u32)
        .unwrap()
        .get("/y", [mw(respond("y", &rec))])
        .unwrap()
        .nest("/c", child)
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/y")).await.unwrap();
    assert_eq!(rec.take(), ["early=2", "late=1", "y"]);

    dispatcher.call(&mut get("/c/x")).await.unwrap();
    assert_eq!(rec.take(), ["late=1", "early=2", "x"]);
}

#[tokio::test]
async fn test_constructor_shapes() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();

    let r = rec.clone();
    tree.router_mut(root)
        .unwrap()
        .use_data("trace", move |depth: &u8, path: &str, route: &RouteRecord<'_>| {
            let label = format!("{} {path}", route.method);
            match depth {
                0 => Dataware::None,
                1 => Dataware::single(mw(record(label, &r))),
                _ => Dataware::Many(vec![
                    (mw(record("second", &r)), Some(2)),
                    (mw(record("first", &r)), Some(1)),
                ]),
            }
        })
        .unwrap()
        .get_with("/none", RouteOptions::new().data("trace", 0u8), [mw(respond("none", &rec))])
        .unwrap()
        .get_with("/one", RouteOptions::new().data("trace", 1u8), [mw(respond("one", &rec))])
        .unwrap()
        .get_with("/many", RouteOptions::new().data("trace", 2u8), [mw(respond("many", &rec))])
        .unwrap();
    let dispatcher = tree.dispatcher(root).unwrap();

    dispatcher.call(&mut get("/none")).await.unwrap();
    dispatcher.call(&mut get("/one")).await.unwrap();
    dispatcher.call(&mut get("/many")).await.unwrap();
    assert_eq!(rec.take(), ["none", "GET /one", "one", "first", "second", "many"]);
}

#[test]
fn test_wrong_value_type_is_rejected() {
    let rec = Recorder::new();
    let mut tree = RouterTree::<Request>::new();
    let root = tree.router(RouterOptions::new()).unwrap();
    let mut router = tree.router_mut(root).unwrap();
    router.use_data("cache", tag("cache", &rec)).unwrap();

    let err = router
        .get_with(
            "/x",
            RouteOptions::new().data("cache", "sixty"),
            [mw(respond("x", &rec))],
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::DataType { ref key, .. } if key == "cache"));
    assert!(tree.routes(root).unwrap().is_empty());
}
