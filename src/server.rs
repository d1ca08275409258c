//! HTTP server lifecycle and graceful shutdown.
//!
//! A [`Server`] goes through three explicit steps:
//!
//! 1. [`Server::bind`] validates the [`ServerConfig`] and opens the listener.
//! 2. [`Server::serve`] accepts connections and dispatches them through a
//!    [`Router`] until SIGTERM, Ctrl-C or [`ShutdownHandle::shutdown`].
//! 3. On shutdown it stops accepting, asks every open connection to finish
//!    its in-flight request and close, waits for them, then returns.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    limits: Limits,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Cloneable trigger that stops a running [`Server`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Requests a graceful shutdown. Calling it more than once, or before
    /// `serve` starts, is fine.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// The per-request bounds taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
struct Limits {
    read_timeout: Duration,
    write_timeout: Duration,
    body_limit: usize,
}

impl Server {
    /// Validates `config` and binds its address. Host names are resolved
    /// here; the first resolved address that binds is used.
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), sendi::Error> {
    /// use sendi::{Router, Server, ServerConfig};
    ///
    /// let server = Server::bind(ServerConfig::default().with_addr("0.0.0.0:3000")).await?;
    /// server.serve(Router::new()).await
    /// # }
    /// ```
    pub async fn bind(config: ServerConfig) -> Result<Self, Error> {
        config.validate()?;
        let listener = TcpListener::bind(config.addr.as_str()).await?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            limits: Limits {
                read_timeout: config.read_timeout(),
                write_timeout: config.write_timeout(),
                body_limit: config.body_limit,
            },
            shutdown: Arc::new(shutdown),
        })
    }

    /// The address actually bound; useful after binding port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Accepts connections and dispatches them through `router`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let router = Arc::new(router);
        let addr = self.local_addr()?;
        info!(%addr, "sendi listening");

        let mut tasks = tokio::task::JoinSet::new();
        let mut stop = self.shutdown.subscribe();
        let shutdown = async {
            tokio::select! {
                () = os_signal() => {}
                () = stopped(&mut stop) => {}
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&router),
                        self.limits,
                        self.shutdown.subscribe(),
                    ));
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Connections started before an OS signal have not seen a stop yet.
        self.shutdown.send_replace(true);
        while tasks.join_next().await.is_some() {}

        info!("sendi stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    limits: Limits,
    mut stop: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { handle(router, req, limits).await }
    });

    // HTTP/1.1 or HTTP/2, whichever the client speaks.
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(limits.read_timeout);

    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = stopped(&mut stop) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        error!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the body, routes, and bounds the handler's run time. Every failure
/// becomes a response, so hyper never sees an error.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    limits: Limits,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let response = match read_body(body, limits).await {
        Ok(body) => {
            match tokio::time::timeout(limits.write_timeout, router.dispatch(parts, body)).await {
                Ok(resp) => resp,
                Err(_) => {
                    warn!(%method, path = %path, "handler timed out");
                    Response::status(StatusCode::SERVICE_UNAVAILABLE)
                }
            }
        }
        Err(status) => Response::status(status),
    };

    debug!(
        %method,
        path = %path,
        status = response.status_code().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    Ok(response.into_http())
}

async fn read_body(body: Incoming, limits: Limits) -> Result<Bytes, StatusCode> {
    let collect = Limited::new(body, limits.body_limit).collect();
    match tokio::time::timeout(limits.read_timeout, collect).await {
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Ok(Err(e)) => {
            debug!("failed to read request body: {e}");
            Err(StatusCode::BAD_REQUEST)
        }
        Err(_) => Err(StatusCode::REQUEST_TIMEOUT),
    }
}

// ── Shutdown signals ──────────────────────────────────────────────────────────

async fn stopped(rx: &mut watch::Receiver<bool>) {
    // The sender outlives every receiver handed out by `serve`.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Resolves on SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C exists.
/// A handler that cannot be installed is logged and never fires.
async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
