//! # sendi
//!
//! A minimal HTTP router with typed request bodies.
//!
//! - Radix-tree routing via [`matchit`], `:name` path parameters and
//!   prefix groups
//! - A per-request [`Context`] for params, query, headers, cookies and form
//!   fields, with JSON / XML / form-urlencoded body decoding through serde
//! - An explicitly constructed [`Server`] (hyper, HTTP/1.1 + HTTP/2) with
//!   graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sendi::{Context, Error, Router, Server, ServerConfig};
//!
//! #[derive(serde::Deserialize)]
//! struct Login { username: String, password: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .get("/users/:id", get_user)
//!         .post("/login", login);
//!
//!     Server::bind(ServerConfig::default()).await?.serve(app).await
//! }
//!
//! async fn get_user(mut ctx: Context) -> Result<Context, Error> {
//!     let id = ctx.param_or("id", "unknown").to_owned();
//!     ctx.send_json(&serde_json::json!({ "id": id }))?;
//!     Ok(ctx)
//! }
//!
//! async fn login(mut ctx: Context) -> Result<Context, Error> {
//!     let login: Login = ctx.decode()?;
//!     ctx.send_text(format!("Hello {}", login.username));
//!     Ok(ctx)
//! }
//! ```

mod config;
mod context;
mod error;
mod handler;
mod method;
mod response;
mod router;
mod server;

pub mod decode;

pub use config::{ConfigError, ServerConfig};
pub use context::Context;
pub use decode::{BodyFormat, DecodeError};
pub use error::Error;
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{Group, Router};
pub use server::{Server, ShutdownHandle};
