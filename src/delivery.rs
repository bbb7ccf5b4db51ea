//! Response delivery engine.
//!
//! Takes the single [`Reply`] a handler produced (or its error) and renders
//! the HTTP response:
//!
//! - **Scalar** → `200`, `application/json`, the value serialized as the body.
//! - **Stream** → `200`, `text/plain; charset=utf-8`, chunked. Each value is
//!   one newline-terminated line of `base64(JSON(value))`; completion appends
//!   a final line encoding the JSON string `"done"`; a mid-stream failure
//!   emits the literal marker `error` and aborts the body.
//! - **Bytes** → `200`, frames piped through unframed.
//! - **Err before anything was written** → `500` with the message and debug
//!   detail as the body.
//!
//! Handler failures never escape this module into the server loop — every
//! outcome becomes a well-formed `http::Response`.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::{HeaderValue, StatusCode, header};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::HandlerError;
use crate::reply::{Reply, ValueStream};

/// The unified response body type: scalar and error bodies are `Full`,
/// stream replies are `StreamBody`, all boxed to one shape.
pub(crate) type ResponseBody = UnsyncBoxBody<Bytes, HandlerError>;

/// Raw marker chunk written when the value stream fails after the response
/// has committed. Deliberately NOT base64-encoded: it breaks the uniform
/// line encoding, but existing consumers match on these exact five bytes,
/// so the inconsistency is preserved rather than fixed.
const ERROR_MARKER: &[u8] = b"error";

/// JSON serialization of the terminal sentinel value `"done"`.
const DONE_JSON: &[u8] = b"\"done\"";

// ── Entry points ──────────────────────────────────────────────────────────────

/// Renders one handler outcome as an HTTP response.
pub(crate) fn deliver(result: Result<Reply, HandlerError>) -> http::Response<ResponseBody> {
    match result {
        Ok(Reply::Scalar(value)) => match serde_json::to_vec(&value) {
            Ok(body) => response(StatusCode::OK, Some("application/json"), full(body)),
            Err(e) => internal_error(HandlerError::new(e)),
        },
        Ok(Reply::Stream(values)) => response(
            StatusCode::OK,
            Some("text/plain; charset=utf-8"),
            StreamBody::new(FramedValues::new(values)).boxed_unsync(),
        ),
        Ok(Reply::Bytes(chunks)) => response(
            StatusCode::OK,
            None,
            StreamBody::new(chunks.map(|r| r.map(Frame::data))).boxed_unsync(),
        ),
        Err(e) => internal_error(e),
    }
}

/// Empty 404 for paths no table entry matches.
pub(crate) fn not_found() -> http::Response<ResponseBody> {
    response(StatusCode::NOT_FOUND, None, full(Vec::new()))
}

/// 500 with the error message and its debug rendering in the body.
fn internal_error(e: HandlerError) -> http::Response<ResponseBody> {
    error!(error = %e, "handler failed before response commit");
    debug!(detail = %serde_json::Value::String(format!("{e:?}")), "handler failure detail");
    let body = format!("{e}\n\n{e:?}").into_bytes();
    response(StatusCode::INTERNAL_SERVER_ERROR, Some("text/plain; charset=utf-8"), full(body))
}

fn full(body: Vec<u8>) -> ResponseBody {
    Full::new(Bytes::from(body)).map_err(|never| match never {}).boxed_unsync()
}

fn response(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: ResponseBody,
) -> http::Response<ResponseBody> {
    let mut res = http::Response::new(body);
    *res.status_mut() = status;
    if let Some(ct) = content_type {
        res.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
    }
    res
}

// ── Chunk encoding ────────────────────────────────────────────────────────────

/// One wire line: `base64(JSON(value))` plus the newline delimiter.
fn encode_line(value: &Value) -> Result<Bytes, serde_json::Error> {
    Ok(encode_json_bytes(&serde_json::to_vec(value)?))
}

fn encode_json_bytes(json: &[u8]) -> Bytes {
    let mut line = BASE64.encode(json).into_bytes();
    line.push(b'\n');
    Bytes::from(line)
}

// ── Framing state machine ─────────────────────────────────────────────────────

/// Adapts a handler's value stream to the chunked wire format.
///
/// Streaming until the inner stream ends (emit the `"done"` sentinel line,
/// then finish cleanly) or fails (emit the raw `error` marker, then yield
/// the error itself so the connection is torn down without a clean chunked
/// terminator — the status line is long gone, so an aborted body is the
/// only remaining failure signal).
struct FramedValues {
    inner: ValueStream,
    state: FrameState,
}

enum FrameState {
    Streaming,
    Aborting(HandlerError),
    Terminated,
}

impl FramedValues {
    fn new(inner: ValueStream) -> Self {
        Self { inner, state: FrameState::Streaming }
    }

    fn fail(&mut self, e: HandlerError) -> Poll<Option<Result<Frame<Bytes>, HandlerError>>> {
        error!(error = %e, "handler stream failed mid-response");
        debug!(detail = %serde_json::Value::String(format!("{e:?}")), "stream failure detail");
        self.state = FrameState::Aborting(e);
        Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(ERROR_MARKER)))))
    }
}

impl Stream for FramedValues {
    type Item = Result<Frame<Bytes>, HandlerError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.state {
            FrameState::Terminated => Poll::Ready(None),
            FrameState::Aborting(_) => {
                let FrameState::Aborting(e) =
                    std::mem::replace(&mut this.state, FrameState::Terminated)
                else {
                    unreachable!()
                };
                Poll::Ready(Some(Err(e)))
            }
            FrameState::Streaming => match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(value)) => match encode_line(&value) {
                    Ok(line) => Poll::Ready(Some(Ok(Frame::data(line)))),
                    Err(e) => this.fail(HandlerError::new(e)),
                },
                Some(Err(e)) => this.fail(e),
                None => {
                    this.state = FrameState::Terminated;
                    Poll::Ready(Some(Ok(Frame::data(encode_json_bytes(DONE_JSON)))))
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ByteStream;
    use futures_util::stream;
    use serde_json::json;

    fn decode_line(line: &[u8]) -> Value {
        let line = line.strip_suffix(b"\n").expect("line not newline-terminated");
        let json = BASE64.decode(line).expect("line not base64");
        serde_json::from_slice(&json).expect("line not JSON")
    }

    #[test]
    fn line_encoding_round_trips() {
        for value in [json!(1), json!("text"), json!({ "a": [1, 2, null] })] {
            let line = encode_line(&value).unwrap();
            assert_eq!(decode_line(&line), value);
        }
    }

    #[tokio::test]
    async fn stream_frames_values_then_done_sentinel() {
        let values: ValueStream = Box::pin(stream::iter([Ok(json!(1)), Ok(json!(2))]));
        let frames: Vec<_> = FramedValues::new(values).collect().await;

        assert_eq!(frames.len(), 3);
        let lines: Vec<Bytes> = frames
            .into_iter()
            .map(|f| f.unwrap().into_data().unwrap_or_else(|_| panic!("not a data frame")))
            .collect();
        assert_eq!(decode_line(&lines[0]), json!(1));
        assert_eq!(decode_line(&lines[1]), json!(2));
        assert_eq!(decode_line(&lines[2]), json!("done"));
    }

    #[tokio::test]
    async fn stream_error_emits_raw_marker_then_aborts() {
        let values: ValueStream = Box::pin(stream::iter([
            Ok(json!(1)),
            Err(HandlerError::msg("upstream gone")),
        ]));
        let frames: Vec<_> = FramedValues::new(values).collect().await;

        assert_eq!(frames.len(), 3);
        assert_eq!(
            decode_line(&frames[0].as_ref().unwrap().data_ref().unwrap()[..]),
            json!(1)
        );
        // The marker is raw bytes, not a base64 line, and no "done" follows.
        assert_eq!(
            &frames[1].as_ref().unwrap().data_ref().unwrap()[..],
            b"error"
        );
        assert!(frames[2].is_err());
    }

    #[tokio::test]
    async fn scalar_delivers_json_body() {
        let res = deliver(Ok(Reply::scalar(json!({ "ok": true }))));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn handler_error_delivers_500_with_message() {
        let res = deliver(Err(HandlerError::msg("boom")));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("boom"));
    }

    #[tokio::test]
    async fn byte_reply_passes_through_unframed() {
        let chunks: ByteStream = Box::pin(stream::iter([
            Ok(Bytes::from_static(b"raw ")),
            Ok(Bytes::from_static(b"bytes")),
        ]));
        let res = deliver(Ok(Reply::Bytes(chunks)));
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::CONTENT_TYPE).is_none());
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"raw bytes");
    }

    #[tokio::test]
    async fn not_found_is_empty_404() {
        let res = not_found();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
