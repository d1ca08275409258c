//! Route handlers.
//!
//! Any `Fn(Context) -> impl Future<Output = impl IntoResponse>` is a
//! handler. At registration it is wrapped into a [`BoxedHandler`], a shared
//! closure that runs the handler and converts its output, so the router can
//! keep handlers of different types in one tree.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

type HandlerFn = dyn Fn(Context) -> BoxFuture + Send + Sync + 'static;

/// A registered handler with its return type erased. Cloning shares it.
#[doc(hidden)]
#[derive(Clone)]
pub struct BoxedHandler(Arc<HandlerFn>);

impl BoxedHandler {
    pub(crate) fn call(&self, ctx: Context) -> BoxFuture {
        (self.0)(ctx)
    }
}

/// Implemented for every valid route handler.
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoResponse
/// ```
///
/// Closures work too. Handlers that write through the context and fail
/// with `?` return `Result<Context, Error>`. The trait is sealed.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler(Arc::new(move |ctx: Context| -> BoxFuture {
            let fut = self(ctx);
            Box::pin(async move { fut.await.into_response() })
        }))
    }
}

mod sealed {
    use super::*;

    pub trait Sealed {}

    impl<F, Fut> Sealed for F
    where
        F: Fn(Context) -> Fut,
        Fut: Future,
        Fut::Output: IntoResponse,
    {
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::error::Error;

    fn ctx() -> Context {
        let (parts, _) = http::Request::get("/").body(()).unwrap().into_parts();
        Context::new(parts, bytes::Bytes::new(), Vec::new())
    }

    #[tokio::test]
    async fn closures_and_fallible_handlers_box_alike() {
        let greet = (|_ctx: Context| async { "hi" }).into_boxed_handler();
        assert_eq!(greet.call(ctx()).await.text_body(), Some("hi"));

        let fail = (|_ctx: Context| async {
            Err::<Context, _>(Error::http(StatusCode::IM_A_TEAPOT, "no coffee"))
        })
        .into_boxed_handler();
        let resp = fail.clone().call(ctx()).await;
        assert_eq!(resp.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.text_body(), Some("no coffee"));
    }
}
