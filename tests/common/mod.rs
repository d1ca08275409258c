//! Shared helpers for integration tests.

#![allow(dead_code)]

use sendi::{Response, Router};

pub fn get(uri: &str) -> http::Request<&'static str> {
    http::Request::get(uri).body("").unwrap()
}

pub fn post(uri: &str, content_type: &str, body: &'static str) -> http::Request<&'static str> {
    http::Request::post(uri)
        .header("content-type", content_type)
        .body(body)
        .unwrap()
}

/// Sends `req` through `app` and returns status + UTF-8 body.
pub async fn call(app: &Router, req: http::Request<&'static str>) -> (u16, String) {
    let resp: Response = app.oneshot(req).await;
    let body = resp.text_body().unwrap_or_default().to_owned();
    (resp.status_code().as_u16(), body)
}
