//! # courier
//!
//! A routing and response-delivery layer on top of hyper. Nothing more.
//! Nothing less.
//!
//! ## The contract
//!
//! hyper owns the sockets, the HTTP parsing, and the connection lifecycle.
//! courier owns the three decisions in between:
//!
//! - **Route ordering** — symbolic route keys (`get_users_$id`) become a
//!   dispatch table sorted by specificity, so the most specific pattern
//!   always matches first, deterministically, no matter the declaration
//!   order.
//! - **Context normalization** — every request becomes one immutable
//!   [`HttpContext`] snapshot: headers, query, path params, body, raw parts.
//! - **Reply delivery** — a handler returns a [`Reply`]: a scalar (one JSON
//!   body), a value stream (chunked, each value one newline-terminated
//!   base64(JSON) line, closed by a `"done"` sentinel), or raw bytes (piped
//!   through unframed). The engine keeps the response correctly framed
//!   across an asynchronous, possibly-failing sequence of values.
//!
//! What courier skips — middleware chains, templating, validation, TLS,
//! body parsing — it skips on purpose. The layer in front of you routes and
//! delivers; your handlers do the rest.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use courier::{HttpContext, HandlerError, Reply, Routes, Server};
//! use futures_util::stream;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let table = Routes::new()
//!         .on("get_users_$id", get_user)
//!         .on("get_users_active", active_users)
//!         .build()
//!         .expect("invalid route key");
//!
//!     Server::bind("0.0.0.0:3000").serve(table).await.unwrap();
//! }
//!
//! // GET /users/:id — scalar reply, 200 application/json
//! async fn get_user(ctx: HttpContext) -> Result<Reply, HandlerError> {
//!     let id = ctx.param("id").unwrap_or("unknown");
//!     Ok(Reply::scalar(json!({ "id": id })))
//! }
//!
//! // GET /users/active — registered before /users/:id regardless of
//! // declaration order: static beats variable. Streams values as framed
//! // chunks, then the "done" sentinel.
//! async fn active_users(_ctx: HttpContext) -> Result<Reply, HandlerError> {
//!     Ok(Reply::stream(stream::iter([
//!         Ok(json!({ "id": 1 })),
//!         Ok(json!({ "id": 2 })),
//!     ])))
//! }
//! ```

mod context;
mod delivery;
mod error;
mod handler;
mod method;
mod queue;
mod reply;
mod routes;
mod server;

pub use context::HttpContext;
pub use error::{Error, HandlerError, RouteError};
pub use handler::Handler;
pub use method::Method;
pub use queue::{IncomingQueue, Pipeline, PipelineBuilder, QueueConsumer, QueueProducer};
pub use reply::{ByteStream, IntoReply, Reply, ValueStream};
pub use routes::{RouteTable, Routes};
pub use server::Server;
