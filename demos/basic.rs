//! Minimal sendi example: params, query, cookies, typed bodies and groups.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic [config.toml]
//!
//! Try:
//!   curl 'http://localhost:3000/hello?name=Adib'
//!   curl http://localhost:3000/users/1/orders/2
//!   curl -H 'firstname: Adib' -b 'lastname=Hauzan' http://localhost:3000/request
//!   curl -X POST http://localhost:3000/login \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"adib","password":"rahasia"}'
//!   curl -X POST http://localhost:3000/register \
//!        -H 'content-type: application/xml' \
//!        -d '<r><username>adib</username><password>x</password><name>Adib</name></r>'
//!   curl http://localhost:3000/api/hello

use sendi::{Context, Error, Router, Server, ServerConfig};
use serde::Deserialize;

#[derive(Deserialize)]
struct Login {
    username: String,
    #[allow(dead_code)]
    password: String,
}

#[derive(Deserialize)]
struct Register {
    #[allow(dead_code)]
    username: String,
    #[allow(dead_code)]
    password: String,
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let app = Router::new()
        .get("/hello", hello)
        .get("/users/:userId/orders/:orderId", order)
        .get("/request", request_info)
        .get("/user", user)
        .post("/login", login)
        .post("/register", register)
        .group("/api", |api| api.get("/hello", hello_world).get("/world", hello_world))
        .group("/web", |web| web.get("/hello", hello_world).get("/world", hello_world));

    Server::bind(config).await?.serve(app).await
}

// GET /hello?name=...
async fn hello(mut ctx: Context) -> Context {
    let name = ctx.query_or("name", "guest").to_owned();
    ctx.send_text(format!("Hello {name}"));
    ctx
}

// GET /users/:userId/orders/:orderId
async fn order(mut ctx: Context) -> Context {
    let msg = format!(
        "Get Order {} From User {}",
        ctx.param_or("orderId", ""),
        ctx.param_or("userId", ""),
    );
    ctx.send_text(msg);
    ctx
}

// GET /request: header + cookie
async fn request_info(mut ctx: Context) -> Context {
    let msg = format!("Hello {} {}", ctx.header_or("firstname", ""), ctx.cookie_or("lastname", ""));
    ctx.send_text(msg);
    ctx
}

// GET /user: JSON response, keys come out sorted
async fn user(mut ctx: Context) -> Result<Context, Error> {
    ctx.send_json(&serde_json::json!({ "username": "adibhauzan", "name": "adib" }))?;
    Ok(ctx)
}

async fn login(mut ctx: Context) -> Result<Context, Error> {
    let login: Login = ctx.decode()?;
    ctx.send_text(format!("Hello {}", login.username));
    Ok(ctx)
}

async fn register(mut ctx: Context) -> Result<Context, Error> {
    let register: Register = ctx.decode()?;
    ctx.send_text(format!("Hello {}", register.name));
    Ok(ctx)
}

async fn hello_world(_ctx: Context) -> &'static str {
    "Hello World"
}
