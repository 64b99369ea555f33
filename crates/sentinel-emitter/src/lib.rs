//! Backpressured SSE event emitter (C5): a single ordered outbound queue
//! per session, drained by one flusher that frames every item as a text
//! `Event` and interleaves a 15s heartbeat.

mod emitter;

pub use emitter::{EmitterStream, EventEmitter};
