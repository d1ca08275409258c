//! Per-request context.
//!
//! A [`Context`] owns everything the handler may read about the request and
//! the single response it may write. Query pairs, cookies and form fields
//! are parsed once, when the context is built.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use http::{StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::decode::{self, BodyFormat, DecodeError};
use crate::error::Error;
use crate::response::{self, ContentType, IntoResponse, Response};

type Pairs = Vec<(String, String)>;

/// The request a handler is serving and the response it is building.
///
/// ```rust
/// use sendi::{Context, Error};
///
/// #[derive(serde::Deserialize)]
/// struct Login { username: String, password: String }
///
/// async fn login(mut ctx: Context) -> Result<Context, Error> {
///     let login: Login = ctx.decode()?;
///     ctx.send_text(format!("Hello {}", login.username));
///     Ok(ctx)
/// }
/// ```
#[derive(Debug)]
pub struct Context {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Pairs,
    query: Pairs,
    cookies: Pairs,
    form: Pairs,
    status: StatusCode,
    response_headers: HeaderMap,
    sent: Option<Response>,
}

impl Context {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, params: Pairs) -> Self {
        let query = parts.uri.query().map(parse_pairs).unwrap_or_default();
        let cookies = parse_cookies(&parts.headers);
        let form = match content_format(&parts.headers) {
            Some(BodyFormat::Form) => parse_pairs_bytes(&body),
            _ => Vec::new(),
        };

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params,
            query,
            cookies,
            form,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            sent: None,
        }
    }

    // ── Request ──────────────────────────────────────────────────────────────

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Route parameters in pattern order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        find(&self.params, name)
    }

    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.param(name).unwrap_or(default)
    }

    /// First value of a percent-decoded query-string key.
    pub fn query(&self, name: &str) -> Option<&str> {
        find(&self.query, name)
    }

    pub fn query_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.query(name).unwrap_or(default)
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        find(&self.cookies, name)
    }

    pub fn cookie_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.cookie(name).unwrap_or(default)
    }

    /// A field of an `application/x-www-form-urlencoded` body. Always `None`
    /// for other content types.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        find(&self.form, name)
    }

    pub fn form_value_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.form_value(name).unwrap_or(default)
    }

    /// Decodes the body into `T`, choosing JSON, XML or form decoding from
    /// the request's `content-type`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        decode::from_content_type(self.header(CONTENT_TYPE.as_str()), &self.body)
    }

    /// Decodes the body as `format`, whatever the request claims.
    pub fn decode_as<T: DeserializeOwned>(&self, format: BodyFormat) -> Result<T, DecodeError> {
        decode::from_bytes(format, &self.body)
    }

    /// Decodes the whole query string into `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        decode::from_bytes(BodyFormat::Form, self.uri.query().unwrap_or("").as_bytes())
    }

    // ── Response ─────────────────────────────────────────────────────────────

    /// Sets the status used by the next `send_*` call.
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = code;
        self
    }

    /// Appends a header to the response the next `send_*` call produces.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        response::append_header(&mut self.response_headers, name, value);
        self
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Responds with `text/plain; charset=utf-8`.
    pub fn send_text(&mut self, body: impl Into<String>) {
        self.send(Some(ContentType::Text), Bytes::from(body.into()));
    }

    /// Responds with `value` serialised as JSON.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        if self.ignore_resend() {
            return Ok(());
        }
        let body = serde_json::to_vec(value)?;
        self.send(Some(ContentType::Json), Bytes::from(body));
        Ok(())
    }

    pub fn send_bytes(&mut self, content_type: ContentType, body: impl Into<Bytes>) {
        self.send(Some(content_type), body.into());
    }

    /// Responds with `code` and no body.
    pub fn send_status(&mut self, code: StatusCode) {
        self.status = code;
        self.send(None, Bytes::new());
    }

    fn send(&mut self, content_type: Option<ContentType>, body: Bytes) {
        if self.ignore_resend() {
            return;
        }
        let mut headers = std::mem::take(&mut self.response_headers);
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct.as_str()));
        }
        self.sent = Some(Response::from_parts(self.status, headers, body));
    }

    fn ignore_resend(&self) -> bool {
        if self.sent.is_some() {
            tracing::warn!(method = %self.method, path = self.path(), "response already sent, ignoring");
            return true;
        }
        false
    }
}

/// An unsent context answers with its staged status and headers and an
/// empty body.
impl IntoResponse for Context {
    fn into_response(self) -> Response {
        match self.sent {
            Some(resp) => resp,
            None => Response::from_parts(self.status, self.response_headers, Bytes::new()),
        }
    }
}

fn find<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn content_format(headers: &HeaderMap) -> Option<BodyFormat> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    BodyFormat::from_content_type(value)
}

fn parse_pairs(query: &str) -> Pairs {
    parse_pairs_bytes(query.as_bytes())
}

fn parse_pairs_bytes(input: &[u8]) -> Pairs {
    url::form_urlencoded::parse(input).into_owned().collect()
}

/// `Cookie: a=1; b="two"` → `[("a", "1"), ("b", "two")]`. Pairs without a
/// name or `=` are skipped.
fn parse_cookies(headers: &HeaderMap) -> Pairs {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn ctx(req: http::Request<&'static str>) -> Context {
        let (parts, body) = req.into_parts();
        Context::new(parts, Bytes::from_static(body.as_bytes()), Vec::new())
    }

    fn get(uri: &str) -> http::request::Builder {
        http::Request::builder().method("GET").uri(uri)
    }

    #[test]
    fn query_values_are_decoded_with_defaults() {
        let c = ctx(get("/hello?name=Adib%20H&tag=a&tag=b").body("").unwrap());
        assert_eq!(c.query("name"), Some("Adib H"));
        assert_eq!(c.query("tag"), Some("a"));
        assert_eq!(c.query_or("missing", "guest"), "guest");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let c = ctx(get("/request").header("FirstName", "Adib").body("").unwrap());
        assert_eq!(c.header("firstname"), Some("Adib"));
        assert_eq!(c.header_or("lastname", "-"), "-");
    }

    #[test]
    fn cookies_are_split_and_unquoted() {
        let c = ctx(
            get("/")
                .header("cookie", "lastname=Hauzan; theme=\"dark\"")
                .header("cookie", "bare; =nameless; sid=42")
                .body("")
                .unwrap(),
        );
        assert_eq!(c.cookie("lastname"), Some("Hauzan"));
        assert_eq!(c.cookie("theme"), Some("dark"));
        assert_eq!(c.cookie("sid"), Some("42"));
        assert_eq!(c.cookie("bare"), None);
        assert_eq!(c.cookie_or("nope", "none"), "none");
    }

    #[test]
    fn form_values_only_for_form_bodies() {
        let form = ctx(
            http::Request::post("/hello")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("name=Adib")
                .unwrap(),
        );
        assert_eq!(form.form_value("name"), Some("Adib"));

        let json = ctx(
            http::Request::post("/hello")
                .header("content-type", "application/json")
                .body("name=Adib")
                .unwrap(),
        );
        assert_eq!(json.form_value("name"), None);
    }

    #[test]
    fn query_as_decodes_typed_shapes() {
        #[derive(Deserialize)]
        struct Search {
            q: String,
            page: u32,
        }

        let c = ctx(get("/search?q=rust&page=2").body("").unwrap());
        let search: Search = c.query_as().unwrap();
        assert_eq!(search.q, "rust");
        assert_eq!(search.page, 2);
    }

    #[test]
    fn first_send_wins() {
        let mut c = ctx(get("/").body("").unwrap());
        c.send_text("first");
        c.send_text("second");
        c.send_json(&["third"]).unwrap();
        assert!(c.is_sent());

        let resp = c.into_response();
        assert_eq!(resp.text_body(), Some("first"));
        assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn staged_status_and_headers_reach_the_response() {
        let mut c = ctx(get("/").body("").unwrap());
        c.status(StatusCode::CREATED).set_header("location", "/users/99");
        c.send_json(&serde_json::json!({ "id": 99 })).unwrap();

        let resp = c.into_response();
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.header("location"), Some("/users/99"));
        assert_eq!(resp.text_body(), Some(r#"{"id":99}"#));
    }

    #[test]
    fn unserialisable_json_is_an_encode_error() {
        // JSON object keys must be strings.
        let mut by_pair = std::collections::BTreeMap::new();
        by_pair.insert((1u8, 2u8), "x");

        let mut c = ctx(get("/").body("").unwrap());
        let err = c.send_json(&by_pair).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
        assert!(!c.is_sent());

        let resp = Err::<Context, _>(err).into_response();
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unsent_context_is_empty_ok() {
        let resp = ctx(get("/").body("").unwrap()).into_response();
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert!(resp.body().is_empty());
    }
}
