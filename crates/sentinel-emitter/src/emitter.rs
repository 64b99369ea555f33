//! Queue, handle and flusher for the event emitter.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;

use sentinel_types::EVENT_PING;

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(15);

enum QueueItem {
    Frame { event: &'static str, data: Value },
    Close,
}

/// The handle sessions hold and call `send`/`close` on. Cheaply cloneable;
/// every clone shares the same bounded queue and `closed` flag, so multiple
/// producers (the controller's main loop and, e.g., a concurrently running
/// tool) can emit into the same session stream safely.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<QueueItem>,
    closed: Arc<AtomicBool>,
}

impl EventEmitter {
    /// Build a bounded channel of capacity `max_queued` (C8's
    /// `MAX_QUEUED_CHUNKS`) and the SSE-ready stream that drains it.
    pub fn channel(max_queued: usize) -> (EventEmitter, EmitterStream) {
        Self::channel_with_heartbeat(max_queued, HEARTBEAT_PERIOD)
    }

    /// Same as [`EventEmitter::channel`] with a configurable heartbeat
    /// period, so tests can observe a heartbeat without waiting 15 seconds.
    pub fn channel_with_heartbeat(max_queued: usize, heartbeat_period: Duration) -> (EventEmitter, EmitterStream) {
        let (tx, rx) = mpsc::channel(max_queued.max(1));
        let closed = Arc::new(AtomicBool::new(false));
        let emitter = EventEmitter { tx, closed };
        let stream = EmitterStream { inner: Box::pin(flusher(rx, heartbeat_period)) };
        (emitter, stream)
    }

    /// Enqueue one wire event. Non-blocking up to the bound: on overflow,
    /// yields cooperatively and retries rather than failing the caller
    /// (soft backpressure). A no-op once [`close`] has been
    /// called.
    ///
    /// [`close`]: EventEmitter::close
    pub async fn send(&self, event: &'static str, data: Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut item = QueueItem::Frame { event, data };
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    item = returned;
                    tokio::task::yield_now().await;
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }

    /// Whether the session stream has ended, either because `close` was
    /// called or because the downstream transport dropped its receiver
    /// (client disconnect). The controller polls this to short-circuit
    /// further production once cancelled.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Drain the queue, then stop the flusher. Subsequent `send` calls are
    /// no-ops. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(QueueItem::Close).await;
    }
}

/// Wraps the flusher as a plain [`Stream`] of axum SSE `Event`s, so it can
/// be handed straight to `Sse::new`.
pub struct EmitterStream {
    inner: Pin<Box<dyn Stream<Item = Event> + Send>>,
}

impl Stream for EmitterStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// The single flusher: races the queue against a heartbeat ticker and
/// yields frames in strict FIFO order, never interleaving a heartbeat in
/// front of an already-queued frame.
fn flusher(mut rx: mpsc::Receiver<QueueItem>, heartbeat_period: Duration) -> impl Stream<Item = Event> {
    async_stream::stream! {
        let mut heartbeat = tokio::time::interval(heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                biased;
                item = rx.recv() => {
                    match item {
                        Some(QueueItem::Frame { event, data }) => {
                            yield frame_event(event, &data);
                        }
                        Some(QueueItem::Close) | None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Event::default().event(EVENT_PING).data("{}");
                }
            }
        }
    }
}

fn frame_event(event: &'static str, data: &Value) -> Event {
    match Event::default().event(event).json_data(data) {
        Ok(e) => e,
        Err(_) => Event::default()
            .event("error")
            .data(r#"{"code":"serialization_error","message":"failed to serialize event payload"}"#),
    }
}
