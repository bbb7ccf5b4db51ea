//! Decoupled incoming-request queue and pipeline composition.
//!
//! The per-route wiring in [`Server::serve`](crate::Server::serve) attaches
//! one handler per table entry. This module is the alternative: every
//! incoming request is pushed onto one explicit channel, and a single
//! [`Pipeline`] — a left-to-right composition of context-transformation
//! stages ending in a responder — consumes the channel and produces each
//! reply. Route logic becomes a stage in a composable pipeline instead of a
//! per-route dispatch target; delivery and context extraction are shared
//! with the standard path.
//!
//! The queue is an explicit object with producer and consumer halves,
//! created once at startup and injected where needed — never ambient global
//! state. Arrival order is preserved: one consumer drains the channel
//! sequentially, though the async work behind each reply may still
//! interleave downstream.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::context::HttpContext;
use crate::error::HandlerError;
use crate::handler::{BoxedHandler, Handler};
use crate::reply::Reply;

/// One queued request: the extracted context plus the slot the consumer
/// answers into. Dropping the slot without answering resolves the request
/// as a 500 on the server side.
type Job = (HttpContext, oneshot::Sender<Result<Reply, HandlerError>>);

/// The incoming-request queue. Exists only to create its two halves.
pub struct IncomingQueue;

impl IncomingQueue {
    /// Creates a bounded queue. Producers (connection tasks) wait when
    /// `capacity` requests are already queued.
    pub fn new(capacity: usize) -> (QueueProducer, QueueConsumer) {
        let (tx, rx) = mpsc::channel(capacity);
        (QueueProducer { tx }, QueueConsumer { rx })
    }
}

/// The producing half, held by the server. Cloned into each connection task.
#[derive(Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<Job>,
}

impl QueueProducer {
    /// Queues one request and waits for the pipeline's reply.
    ///
    /// `None` means the consumer is gone (channel closed or slot dropped);
    /// the caller reports that as a server-side failure.
    pub(crate) async fn submit(
        &self,
        ctx: HttpContext,
    ) -> Option<Result<Reply, HandlerError>> {
        let (slot, answer) = oneshot::channel();
        self.tx.send((ctx, slot)).await.ok()?;
        answer.await.ok()
    }
}

/// The consuming half. Exactly one exists per queue; run it once.
pub struct QueueConsumer {
    rx: mpsc::Receiver<Job>,
}

impl QueueConsumer {
    /// Drains the queue in arrival order, applying `pipeline` to each
    /// context and answering the waiting connection task.
    ///
    /// Returns when every producer clone has been dropped.
    pub async fn run(mut self, pipeline: Pipeline) {
        while let Some((ctx, slot)) = self.rx.recv().await {
            let result = pipeline.apply(ctx).await;
            if slot.send(result).is_err() {
                // Requester went away while we worked; nothing to deliver to.
                debug!("queued request abandoned before reply");
            }
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

type StageFn = Arc<dyn Fn(HttpContext) -> HttpContext + Send + Sync + 'static>;

/// Left-to-right composition of transformation stages, terminated by a
/// responder.
///
/// ```rust,no_run
/// # use courier::{HttpContext, HandlerError, Reply, Pipeline};
/// # async fn respond(_: HttpContext) -> Result<Reply, HandlerError> { todo!() }
/// let pipeline = Pipeline::builder()
///     .stage(|ctx| ctx.with_param("tenant", "acme"))
///     .stage(|ctx| ctx.with_param("region", "eu"))
///     .respond(respond);
/// ```
pub struct Pipeline {
    stages: Vec<StageFn>,
    responder: BoxedHandler,
}

impl Pipeline {
    /// Starts an empty pipeline. Add stages, then terminate with
    /// [`PipelineBuilder::respond`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Runs the context through every stage in order, then the responder.
    pub(crate) async fn apply(&self, mut ctx: HttpContext) -> Result<Reply, HandlerError> {
        for stage in &self.stages {
            ctx = stage(ctx);
        }
        self.responder.call(ctx).await
    }
}

/// An unterminated pipeline: stages only, no responder yet.
pub struct PipelineBuilder {
    stages: Vec<StageFn>,
}

impl PipelineBuilder {
    /// Appends a transformation stage. Stages run in the order added.
    pub fn stage(
        mut self,
        f: impl Fn(HttpContext) -> HttpContext + Send + Sync + 'static,
    ) -> Self {
        self.stages.push(Arc::new(f));
        self
    }

    /// Terminates the pipeline with the handler that produces the reply.
    pub fn respond(self, handler: impl Handler) -> Pipeline {
        Pipeline {
            stages: self.stages,
            responder: handler.into_boxed_handler(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> HttpContext {
        let (parts, ()) = http::Request::builder()
            .uri("/anything")
            .body(())
            .unwrap()
            .into_parts();
        HttpContext::from_parts(parts, HashMap::new(), Bytes::new())
    }

    async fn echo_params(ctx: HttpContext) -> Result<Reply, HandlerError> {
        let trail = ctx.param("trail").unwrap_or("").to_owned();
        Ok(Reply::scalar(json!({ "trail": trail })))
    }

    #[tokio::test]
    async fn stages_run_left_to_right() {
        let pipeline = Pipeline::builder()
            .stage(|ctx| {
                let trail = format!("{}a", ctx.param("trail").unwrap_or(""));
                ctx.with_param("trail", &trail)
            })
            .stage(|ctx| {
                let trail = format!("{}b", ctx.param("trail").unwrap_or(""));
                ctx.with_param("trail", &trail)
            })
            .respond(echo_params);

        match pipeline.apply(ctx()).await.unwrap() {
            Reply::Scalar(v) => assert_eq!(v, json!({ "trail": "ab" })),
            _ => panic!("expected scalar reply"),
        }
    }

    #[tokio::test]
    async fn queue_answers_in_arrival_order() {
        let (producer, consumer) = IncomingQueue::new(8);
        let pipeline = Pipeline::builder().respond(echo_params);
        let worker = tokio::spawn(consumer.run(pipeline));

        for _ in 0..3 {
            let reply = producer.submit(ctx()).await.expect("consumer alive");
            assert!(matches!(reply, Ok(Reply::Scalar(_))));
        }

        drop(producer);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn submit_reports_closed_queue() {
        let (producer, consumer) = IncomingQueue::new(1);
        drop(consumer);
        assert!(producer.submit(ctx()).await.is_none());
    }
}
