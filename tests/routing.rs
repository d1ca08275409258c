//! Routing, parameters and request accessors, end to end through `Router::oneshot`.

mod common;

use common::{call, get, post};
use sendi::{Context, Method, Router};

async fn hello_world(mut ctx: Context) -> Context {
    ctx.send_text("Hello World");
    ctx
}

async fn api_only(_ctx: Context) -> &'static str {
    "api"
}

#[tokio::test]
async fn root_route_answers() {
    async fn root(mut ctx: Context) -> Context {
        ctx.send_text("Hello world");
        ctx
    }

    let app = Router::new().get("/", root);
    assert_eq!(call(&app, get("/")).await, (200, "Hello world".to_owned()));
}

#[tokio::test]
async fn query_with_default() {
    async fn hello(mut ctx: Context) -> Context {
        let name = ctx.query_or("name", "guest").to_owned();
        ctx.send_text(format!("Hello {name}"));
        ctx
    }

    let app = Router::new().get("/hello", hello);
    assert_eq!(call(&app, get("/hello?name=Adib")).await.1, "Hello Adib");
    assert_eq!(call(&app, get("/hello")).await.1, "Hello guest");
}

#[tokio::test]
async fn header_and_cookie() {
    async fn request(mut ctx: Context) -> Context {
        let msg = format!("Hello {} {}", ctx.header_or("firstname", ""), ctx.cookie_or("lastname", ""));
        ctx.send_text(msg);
        ctx
    }

    let app = Router::new().get("/request", request);
    let req = http::Request::get("/request")
        .header("firstname", "Adib")
        .header("cookie", "lastname=Hauzan")
        .body("")
        .unwrap();
    assert_eq!(call(&app, req).await, (200, "Hello Adib Hauzan".to_owned()));
}

#[tokio::test]
async fn route_parameters() {
    async fn order(mut ctx: Context) -> Context {
        let msg = format!(
            "Get Order {} From User {}",
            ctx.param_or("orderId", ""),
            ctx.param_or("userId", ""),
        );
        ctx.send_text(msg);
        ctx
    }

    let app = Router::new().get("/users/:userId/orders/:orderId", order);
    assert_eq!(
        call(&app, get("/users/1/orders/2")).await,
        (200, "Get Order 2 From User 1".to_owned())
    );
    // A missing segment does not match.
    assert_eq!(call(&app, get("/users/1/orders")).await.0, 404);
}

#[tokio::test]
async fn wildcard_binds_the_rest_of_the_path() {
    async fn files(mut ctx: Context) -> Context {
        let path = ctx.param_or("path", "").to_owned();
        ctx.send_text(path);
        ctx
    }

    let app = Router::new().get("/files/*path", files);
    assert_eq!(call(&app, get("/files/a/b/c.txt")).await.1, "a/b/c.txt");
}

#[tokio::test]
async fn form_value() {
    async fn hello(mut ctx: Context) -> Context {
        let name = ctx.form_value_or("name", "").to_owned();
        ctx.send_text(format!("Hello {name}"));
        ctx
    }

    let app = Router::new().post("/hello", hello);
    let req = post("/hello", "application/x-www-form-urlencoded", "name=Adib");
    assert_eq!(call(&app, req).await, (200, "Hello Adib".to_owned()));
}

#[tokio::test]
async fn groups_resolve_independently() {
    let app = Router::new()
        .group("/api", |api| api.get("/hello", hello_world).get("/only", api_only))
        .group("/web", |web| web.get("/hello", hello_world).get("/world", hello_world));

    assert_eq!(call(&app, get("/api/hello")).await, (200, "Hello World".to_owned()));
    assert_eq!(call(&app, get("/web/hello")).await, (200, "Hello World".to_owned()));
    assert_eq!(call(&app, get("/api/only")).await.1, "api");
    assert_eq!(call(&app, get("/web/only")).await.0, 404);
    assert_eq!(call(&app, get("/api/world")).await.0, 404);
}

#[tokio::test]
async fn every_registered_route_matches_exactly() {
    async fn describe(mut ctx: Context) -> Context {
        let params = ctx.params().map(|(k, v)| format!("{k}:{v}")).collect::<Vec<_>>().join(" ");
        let msg = format!("{} {}", ctx.method(), params);
        ctx.send_text(msg);
        ctx
    }

    let routes = [
        (Method::Get, "/items", "/items", "GET "),
        (Method::Post, "/items", "/items", "POST "),
        (Method::Get, "/items/:id", "/items/9", "GET id:9"),
        (Method::Put, "/items/:id", "/items/9", "PUT id:9"),
        (Method::Delete, "/items/:id/tags/:tag", "/items/9/tags/red", "DELETE id:9 tag:red"),
    ];

    let app = routes
        .iter()
        .fold(Router::new(), |app, (method, pattern, _, _)| app.on(*method, pattern, describe));

    for (method, _, path, expected) in routes {
        let req = http::Request::builder().method(method.as_str()).uri(path).body("").unwrap();
        assert_eq!(call(&app, req).await, (200, expected.to_owned()), "{method} {path}");
    }
}

#[tokio::test]
async fn unregistered_path_is_not_found() {
    let app = Router::new().get("/", hello_world);
    let (status, body) = call(&app, get("/nope")).await;
    assert_eq!(status, 404);
    assert_eq!(body, "no route for GET /nope");
}

#[tokio::test]
async fn empty_router_is_not_found() {
    let app = Router::new();
    assert_eq!(call(&app, get("/")).await.0, 404);
}
