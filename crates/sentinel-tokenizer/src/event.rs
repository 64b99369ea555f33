use serde_json::Value;

/// One item in the totally ordered sequence the tokenizer produces from a
/// fed text stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    /// Bytes between frames. Discardable by upstream.
    Text { chunk: String },
    JsonBegin { id: String, schema: String },
    JsonDelta { id: String, chunk: String },
    JsonEnd { id: String, length: usize },
    /// Emitted once, at close, with no preceding open event.
    ToolCall {
        id: String,
        name: String,
        /// `None` if the accumulated body failed to parse as JSON.
        args: Option<Value>,
    },
    ResultBegin { id: String, schema: String },
    ResultDelta { id: String, chunk: String },
    ResultEnd { id: String, length: usize },
}
