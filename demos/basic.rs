//! Minimal courier example — route keys, the three reply shapes, and
//! specificity ordering in action.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/active        # streamed, framed lines
//!   curl http://localhost:3000/export              # raw byte passthrough
//!
//! Decode a framed line with:
//!   curl -s http://localhost:3000/users/active | while read l; do echo "$l" | base64 -d; echo; done

use bytes::Bytes;
use courier::{HandlerError, HttpContext, Reply, Routes, Server};
use futures_util::stream;
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let table = Routes::new()
        .on("get_users_$id", get_user)
        .on("get_users_active", active_users)
        .on("get_export", export)
        .on("post_orders", create_order)
        .build()
        .expect("invalid route key");

    Server::bind("0.0.0.0:3000")
        .serve(table)
        .await
        .expect("server error");
}

// GET /users/:id — scalar reply: 200, application/json
async fn get_user(ctx: HttpContext) -> Result<Reply, HandlerError> {
    let id = ctx.param("id").unwrap_or("unknown");
    Ok(Reply::scalar(json!({ "id": id, "name": "alice" })))
}

// GET /users/active — shadows /users/:id for its exact path (static beats
// variable). Each value arrives as one base64(JSON) line; the stream closes
// with a line encoding "done".
async fn active_users(_ctx: HttpContext) -> Result<Reply, HandlerError> {
    Ok(Reply::stream(stream::iter([
        Ok(json!({ "id": 1, "name": "alice" })),
        Ok(json!({ "id": 2, "name": "bob" })),
    ])))
}

// GET /export — raw bytes piped through, no framing added
async fn export(_ctx: HttpContext) -> Result<Reply, HandlerError> {
    Ok(Reply::bytes(stream::iter([
        Ok(Bytes::from_static(b"id,name\n")),
        Ok(Bytes::from_static(b"1,alice\n2,bob\n")),
    ])))
}

// POST /orders — handler failure before the reply: 500 with the message
async fn create_order(ctx: HttpContext) -> Result<Reply, HandlerError> {
    if ctx.body().is_empty() {
        return Err(HandlerError::msg("empty order body"));
    }
    Ok(Reply::scalar(json!({ "status": "accepted" })))
}
