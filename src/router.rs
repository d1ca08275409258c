//! Radix-tree request router.
//!
//! One [`matchit`] tree per HTTP method, O(path-length) lookup. Patterns use
//! `:name` for a single segment and `*name` for the rest of the path;
//! matchit's own `{name}` / `{*name}` spellings are accepted too.
//!
//! A static segment always outranks a parameter in the same position, no
//! matter which was registered first. Two patterns that differ only in
//! parameter names cannot both be registered, so every `(method, path)`
//! resolves to at most one handler.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use matchit::{InsertError, Router as MatchitRouter};

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::response::{IntoResponse, Response};

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers a `", stringify!($method), "` route. See [`Router::on`].")]
            pub fn $name(self, path: &str, handler: impl Handler) -> Self {
                self.on(Method::$method, path, handler)
            }
        )*
    };
}

/// The application router.
///
/// Build it once at startup and hand it to [`Server::serve`](crate::Server::serve).
/// Registration chains by value:
///
/// ```rust
/// use sendi::{Context, Router};
///
/// async fn hello(mut ctx: Context) -> Context {
///     ctx.send_text("Hello World");
///     ctx
/// }
///
/// let app = Router::new()
///     .get("/", hello)
///     .group("/api", |api| api.get("/hello", hello).get("/world", hello))
///     .group("/web", |web| web.get("/hello", hello));
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
    registered: BTreeSet<(Method, String)>,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), registered: BTreeSet::new() }
    }

    /// Registers a handler for a method + pattern pair. Returns `self` for
    /// chaining.
    ///
    /// # Panics
    ///
    /// Panics if [`Router::try_on`] would fail. Routes are fixed at startup,
    /// so a bad pattern is a programming error.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        if let Err(e) = self.try_on(method, pattern, handler) {
            panic!("{e}");
        }
        self
    }

    /// Registers a handler, reporting malformed, conflicting or duplicate
    /// patterns instead of panicking.
    pub fn try_on(&mut self, method: Method, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        let normalized = normalize(pattern).map_err(|reason| Error::InvalidRoute {
            pattern: pattern.to_owned(),
            reason,
        })?;

        if self.registered.contains(&(method, normalized.clone())) {
            return Err(Error::DuplicateRoute { method, pattern: pattern.to_owned() });
        }

        self.trees
            .entry(method)
            .or_default()
            .insert(normalized.clone(), handler.into_boxed_handler())
            .map_err(|e| invalid(pattern, &e))?;

        tracing::debug!(%method, pattern = %normalized, "route registered");
        self.registered.insert((method, normalized));
        Ok(())
    }

    method_shortcuts! {
        get => Get,
        head => Head,
        post => Post,
        put => Put,
        patch => Patch,
        delete => Delete,
        options => Options,
    }

    /// Registers every route added inside `routes` under `prefix`.
    pub fn group(self, prefix: &str, routes: impl FnOnce(Group) -> Group) -> Self {
        routes(Group { router: self, prefix: join("", prefix) }).router
    }

    /// Registered routes in matchit spelling, ordered by method then pattern.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.registered.iter().map(|(m, p)| (*m, p.as_str()))
    }

    /// Resolves `method` + `path` to a handler and its bound parameters.
    ///
    /// `HEAD` falls back to the `GET` route when no `HEAD` route matches.
    pub(crate) fn lookup(
        &self,
        method: &http::Method,
        path: &str,
    ) -> Result<(BoxedHandler, Vec<(String, String)>), Error> {
        let known = Method::try_from(method).ok();
        let found = known.and_then(|m| self.find(m, path)).or_else(|| match known {
            Some(Method::Head) => self.find(Method::Get, path),
            _ => None,
        });
        if let Some(found) = found {
            return Ok(found);
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() && known.is_some() {
            return Err(Error::NotFound { method: method.to_string(), path: path.to_owned() });
        }
        Err(Error::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_owned(),
            allowed,
        })
    }

    fn find(&self, method: Method, path: &str) -> Option<(BoxedHandler, Vec<(String, String)>)> {
        let matched = self.trees.get(&method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value.clone(), params))
    }

    fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = self
            .trees
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| *m)
            .collect();
        if allowed.contains(&Method::Get) && !allowed.contains(&Method::Head) {
            allowed.push(Method::Head);
        }
        allowed.sort();
        allowed
    }

    /// Routes one request that is already fully read.
    pub(crate) async fn dispatch(&self, parts: http::request::Parts, body: Bytes) -> Response {
        let head = parts.method == http::Method::HEAD;
        let response = match self.lookup(&parts.method, parts.uri.path()) {
            Ok((handler, params)) => handler.call(Context::new(parts, body, params)).await,
            Err(err) => {
                tracing::debug!(error = %err, "no handler");
                err.into_response()
            }
        };
        if head { response.into_head() } else { response }
    }

    /// Runs a single in-memory request through the router, without a socket.
    ///
    /// ```rust
    /// use sendi::{Context, Router};
    ///
    /// async fn root(mut ctx: Context) -> Context {
    ///     ctx.send_text("Hello world");
    ///     ctx
    /// }
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let app = Router::new().get("/", root);
    /// let resp = app.oneshot(http::Request::get("/").body("").unwrap()).await;
    /// assert_eq!(resp.text_body(), Some("Hello world"));
    /// # }
    /// ```
    pub async fn oneshot<B: Into<Bytes>>(&self, req: http::Request<B>) -> Response {
        let (parts, body) = req.into_parts();
        self.dispatch(parts, body.into()).await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Routes registered under a shared path prefix.
///
/// Only exists while [`Router::group`] runs; nothing of it survives into
/// request handling.
pub struct Group {
    router: Router,
    prefix: String,
}

impl Group {
    /// Registers `prefix + pattern`. Panics like [`Router::on`].
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        let full = join(&self.prefix, pattern);
        Self { router: self.router.on(method, &full, handler), prefix: self.prefix }
    }

    pub fn try_on(&mut self, method: Method, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        let full = join(&self.prefix, pattern);
        self.router.try_on(method, &full, handler)
    }

    method_shortcuts! {
        get => Get,
        head => Head,
        post => Post,
        put => Put,
        patch => Patch,
        delete => Delete,
        options => Options,
    }

    /// Nests another prefix below this one.
    pub fn group(self, prefix: &str, routes: impl FnOnce(Group) -> Group) -> Self {
        let nested = Group { router: self.router, prefix: join(&self.prefix, prefix) };
        Self { router: routes(nested).router, prefix: self.prefix }
    }
}

fn invalid(pattern: &str, e: &InsertError) -> Error {
    Error::InvalidRoute { pattern: pattern.to_owned(), reason: e.to_string() }
}

/// `/users/:id/*rest` → `/users/{id}/{*rest}`.
fn normalize(pattern: &str) -> Result<String, String> {
    if !pattern.starts_with('/') {
        return Err("pattern must start with `/`".to_owned());
    }
    let segments = pattern
        .split('/')
        .map(|seg| {
            if let Some(name) = seg.strip_prefix(':') {
                if name.is_empty() {
                    return Err("empty parameter name".to_owned());
                }
                Ok(format!("{{{name}}}"))
            } else if let Some(name) = seg.strip_prefix('*') {
                let name = if name.is_empty() { "wildcard" } else { name };
                Ok(format!("{{*{name}}}"))
            } else {
                Ok(seg.to_owned())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

/// Joins a group prefix and a pattern with exactly one `/` between them.
/// A bare `/` pattern addresses the prefix itself.
fn join(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match pattern {
        "" | "/" if prefix.is_empty() => "/".to_owned(),
        "" | "/" => prefix.to_owned(),
        p if p.starts_with('/') => format!("{prefix}{p}"),
        p => format!("{prefix}/{p}"),
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    async fn echo_params(mut ctx: Context) -> Context {
        let joined = ctx.params().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
        ctx.send_text(joined);
        ctx
    }

    async fn fixed(_ctx: Context) -> &'static str {
        "fixed"
    }

    fn req(method: &str, uri: &str) -> http::Request<&'static str> {
        http::Request::builder().method(method).uri(uri).body("").unwrap()
    }

    #[test]
    fn normalizes_colon_and_star_segments() {
        assert_eq!(normalize("/users/:id").unwrap(), "/users/{id}");
        assert_eq!(normalize("/files/*path").unwrap(), "/files/{*path}");
        assert_eq!(normalize("/files/*").unwrap(), "/files/{*wildcard}");
        assert_eq!(normalize("/users/{id}").unwrap(), "/users/{id}");
        assert!(normalize("users").is_err());
        assert!(normalize("/users/:").is_err());
    }

    #[test]
    fn joins_group_prefixes() {
        assert_eq!(join("/api", "/hello"), "/api/hello");
        assert_eq!(join("/api/", "hello"), "/api/hello");
        assert_eq!(join("/api", "/"), "/api");
        assert_eq!(join("", "/"), "/");
        assert_eq!(join("", "/api"), "/api");
    }

    #[tokio::test]
    async fn binds_named_parameters() {
        let app = Router::new().get("/users/:userId/orders/:orderId", echo_params);
        let resp = app.oneshot(req("GET", "/users/1/orders/2")).await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.text_body(), Some("userId=1,orderId=2"));
    }

    #[tokio::test]
    async fn static_segment_wins_regardless_of_order() {
        let app = Router::new().get("/users/:id", echo_params).get("/users/new", fixed);
        assert_eq!(app.oneshot(req("GET", "/users/new")).await.text_body(), Some("fixed"));
        assert_eq!(app.oneshot(req("GET", "/users/7")).await.text_body(), Some("id=7"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut app = Router::new();
        app.try_on(Method::Get, "/users/:id", fixed).unwrap();

        let err = app.try_on(Method::Get, "/users/{id}", fixed).unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute { method: Method::Get, .. }));

        // Same pattern under another method is a different route.
        app.try_on(Method::Post, "/users/:id", fixed).unwrap();
    }

    #[test]
    fn conflicting_parameter_names_are_rejected() {
        let mut app = Router::new();
        app.try_on(Method::Get, "/users/:id", fixed).unwrap();
        let err = app.try_on(Method::Get, "/users/:name", fixed).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    #[should_panic(expected = "route already registered")]
    fn chained_duplicate_panics() {
        let _ = Router::new().get("/", fixed).get("/", fixed);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = Router::new().get("/", fixed);
        let resp = app.oneshot(req("GET", "/missing")).await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let app = Router::new().get("/login", fixed).post("/login", fixed);
        let resp = app.oneshot(req("DELETE", "/login")).await;
        assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.header("allow"), Some("GET, HEAD, POST"));
    }

    #[tokio::test]
    async fn head_falls_back_to_get() {
        let app = Router::new().get("/users/:id", echo_params);
        let resp = app.oneshot(req("HEAD", "/users/7")).await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.header("content-length"), Some("4"));
        assert!(resp.body().is_empty());
    }

    #[tokio::test]
    async fn explicit_head_route_beats_get() {
        async fn head_only(mut ctx: Context) -> Context {
            ctx.set_header("x-route", "head");
            ctx
        }

        let app = Router::new().get("/", fixed).head("/", head_only);
        let resp = app.oneshot(req("HEAD", "/")).await;
        assert_eq!(resp.header("x-route"), Some("head"));
    }

    #[tokio::test]
    async fn unsupported_method_is_not_allowed() {
        let app = Router::new().get("/", fixed);
        let resp = app.oneshot(req("PURGE", "/")).await;
        assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn groups_nest_and_list_routes() {
        let app = Router::new()
            .group("/api", |api| {
                api.get("/hello", fixed)
                    .group("/v1", |v1| v1.post("/users/:id", fixed))
                    .get("/", fixed)
            });

        let routes: Vec<_> = app.routes().collect();
        assert_eq!(
            routes,
            vec![
                (Method::Get, "/api"),
                (Method::Get, "/api/hello"),
                (Method::Post, "/api/v1/users/{id}"),
            ]
        );
    }
}
