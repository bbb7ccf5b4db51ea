//! Handler output shapes and the [`IntoReply`] conversion trait.
//!
//! A handler produces exactly one [`Reply`] per request, and the reply's
//! variant — not a runtime inspection of the value — decides how the
//! delivery engine frames the response: scalar body, chunked value stream,
//! or raw byte passthrough.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde_json::Value;

use crate::error::HandlerError;

/// A lazy source of values to be framed onto a chunked response.
pub type ValueStream =
    Pin<Box<dyn Stream<Item = Result<Value, HandlerError>> + Send + 'static>>;

/// A lazy source of raw bytes piped to the client unframed.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, HandlerError>> + Send + 'static>>;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a handler sends back.
///
/// ```rust
/// use courier::Reply;
/// use futures_util::stream;
/// use serde_json::json;
///
/// // 200, application/json, body `{"ok":true}`
/// Reply::scalar(json!({ "ok": true }));
///
/// // 200, chunked: one base64(JSON)+newline line per value,
/// // then a final line encoding the string "done"
/// Reply::stream(stream::iter([Ok(json!(1)), Ok(json!(2))]));
/// ```
pub enum Reply {
    /// One value, serialized to JSON, sent as a regular 200 body.
    Scalar(Value),
    /// A stream of values, each framed as a `base64(JSON(value))` line on a
    /// chunked response, terminated by a `"done"` sentinel line.
    Stream(ValueStream),
    /// Raw bytes piped through with no framing added.
    Bytes(ByteStream),
}

impl Reply {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn stream(
        values: impl Stream<Item = Result<Value, HandlerError>> + Send + 'static,
    ) -> Self {
        Self::Stream(Box::pin(values))
    }

    pub fn bytes(
        chunks: impl Stream<Item = Result<Bytes, HandlerError>> + Send + 'static,
    ) -> Self {
        Self::Bytes(Box::pin(chunks))
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion into a [`Reply`], so handlers can return plain values.
///
/// `async fn h(ctx: HttpContext) -> Result<serde_json::Value, HandlerError>`
/// is a valid handler; the value becomes a scalar reply.
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Reply {
        Reply::Scalar(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply {
        Reply::Scalar(Value::String(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply {
        Reply::Scalar(Value::String(self.to_owned()))
    }
}
