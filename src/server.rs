//! HTTP server loop and dispatch attachment.
//!
//! This is the only module that touches the underlying server framework —
//! hyper's connection machinery and request/response primitives. Everything
//! here is adapter plumbing: accept connections, hand each request to the
//! context extractor, the handler (or queue), and the delivery engine.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting immediately and lets
//! every in-flight connection task run to completion before returning —
//! including connections mid-way through a chunked value stream. Set your
//! orchestrator's grace period longer than your slowest stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::context;
use crate::delivery::{self, ResponseBody};
use crate::error::{Error, HandlerError};
use crate::method::Method;
use crate::queue::QueueProducer;
use crate::routes::RouteTable;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when served.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Serves requests through the route table: lookup, extract, handle,
    /// deliver. Unmatched `(method, path)` pairs get an empty 404.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, table: RouteTable) -> Result<(), Error> {
        for (method, pattern) in table.routes() {
            info!(%method, pattern, "route registered");
        }
        let table = Arc::new(table);
        self.run(move |req| {
            let table = Arc::clone(&table);
            async move { dispatch(table, req).await }
        })
        .await
    }

    /// Serves requests through the decoupled incoming queue instead of the
    /// route table: every request is extracted, queued, and answered by
    /// whatever pipeline consumes the queue. See [`crate::IncomingQueue`].
    pub async fn serve_queued(self, queue: QueueProducer) -> Result<(), Error> {
        self.run(move |req| {
            let queue = queue.clone();
            async move { dispatch_queued(queue, req).await }
        })
        .await
    }

    /// The accept loop shared by both serving modes.
    async fn run<F, Fut>(self, handle: F) -> Result<(), Error>
    where
        F: Fn(hyper::Request<Incoming>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<http::Response<ResponseBody>, Infallible>> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "courier listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom. Shutdown
                // is checked first so a SIGTERM immediately stops accepting,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let handle = handle.clone();
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the
                    // hyper IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`, called once per request on the
                        // connection.
                        let svc = service_fn(move |req| handle(req));

                        // `auto::Builder` handles both HTTP/1.1 and HTTP/2,
                        // whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not
                // grow without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection before returning.
        while tasks.join_next().await.is_some() {}

        info!("courier stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Per-route hot path: table lookup, context extraction, handler, delivery.
///
/// The error type is [`Infallible`] — every failure becomes an HTTP response
/// (404, 500, mid-stream marker) before hyper sees it.
async fn dispatch(
    table: Arc<RouteTable>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        return Ok(delivery::not_found());
    };
    let path = req.uri().path().to_owned();

    let response = match table.lookup(method, &path) {
        Some((handler, params)) => {
            let result = match context::extract(req, params).await {
                Ok(ctx) => handler.call(ctx).await,
                Err(e) => Err(e),
            };
            delivery::deliver(result)
        }
        None => delivery::not_found(),
    };

    Ok(response)
}

/// Queued-mode hot path: extraction, queue submission, delivery. Path
/// parameters stay empty — the pipeline owns any path interpretation.
async fn dispatch_queued(
    queue: QueueProducer,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let result = match context::extract(req, HashMap::new()).await {
        Ok(ctx) => match queue.submit(ctx).await {
            Some(outcome) => outcome,
            None => Err(HandlerError::msg("request queue unavailable")),
        },
        Err(e) => Err(e),
    };
    Ok(delivery::deliver(result))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C, for
/// local dev). On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
