//! Scripted provider double (ambient test tooling): drives the full
//! request pipeline deterministically, keyed by the `mode` the session
//! controller embeds in its system message, without a real upstream model.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client::{ProviderClient, ProviderStream};
use crate::error::Result;
use crate::types::{ChatMessage, CompletionRequest, ProviderEvent};

const OPEN: &str = "\u{27E6}";
const CLOSE: &str = "\u{27E7}";

fn object_frame(id: &str, schema: &str, body: &str) -> String {
    format!("{OPEN}BEGIN_OBJECT id={id} schema={schema}{CLOSE}{body}{OPEN}END_OBJECT{CLOSE}")
}

fn tool_call_frame(id: &str, name: &str, args: &str) -> String {
    format!("{OPEN}BEGIN_TOOL_CALL id={id} name={name}{CLOSE}{args}{OPEN}END_TOOL_CALL{CLOSE}")
}

fn result_begin(id: &str, schema: &str) -> String {
    format!("{OPEN}BEGIN_RESULT id={id} schema={schema}{CLOSE}")
}

fn result_end() -> String {
    format!("{OPEN}END_RESULT{CLOSE}")
}

/// Split `body` into `n` roughly-equal, char-boundary-safe pieces, each
/// delivered as its own `TextDelta` so the tokenizer emits `n` separate
/// `result.delta` events — used to drive the backpressure scenario past
/// the emitter's soft-backpressure threshold without needing a huge body.
fn split_chunks(body: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let step = chars.len().div_ceil(n).max(1);
    chars.chunks(step).map(|c| c.iter().collect()).collect()
}

/// How many provider rounds this session has already completed, derived
/// from the assistant-visible tool-outcome records the controller appends
/// to the message list after each round. Stateless:
/// the mock is shared across concurrent sessions, so round tracking lives
/// in the conversation itself rather than in any mutable field here.
fn round_index(messages: &[ChatMessage]) -> usize {
    messages.iter().filter(|m| m.content.starts_with("TOOL_RESULT")).count()
}

/// The controller embeds `mode=<value>` in its first system message so this
/// mock (and only this mock — a real backend ignores it as ordinary
/// instruction text) can select a deterministic script.
fn extract_mode(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find_map(|m| {
            m.content.split_whitespace().find_map(|token| token.strip_prefix("mode=")).map(str::to_string)
        })
        .unwrap_or_default()
}

fn events_for(mode: &str, round: usize) -> Vec<ProviderEvent> {
    match (mode, round) {
        ("", 0) | ("happy_path", 0) => vec![
            ProviderEvent::TextDelta(object_frame("o1", "Action", r#"{"type":"plan","steps":["search","book"]}"#)),
            ProviderEvent::TextDelta(tool_call_frame("t1", "places.search", r#"{"query":"pizza"}"#)),
            ProviderEvent::Done,
        ],
        ("", 1) | ("happy_path", 1) => vec![
            ProviderEvent::TextDelta(tool_call_frame("t2", "bookings.create", r#"{"place":"Tony's Pizzeria","time":"7pm"}"#)),
            ProviderEvent::Done,
        ],
        ("", _) | ("happy_path", _) => vec![
            ProviderEvent::TextDelta(result_begin("r1", "AssistantReply")),
            ProviderEvent::TextDelta(r#"{"answer":"Booked at Tony's Pizzeria at 7pm"}"#.to_string()),
            ProviderEvent::TextDelta(result_end()),
            ProviderEvent::Done,
        ],

        ("retry_test", 0) => vec![
            ProviderEvent::TextDelta(tool_call_frame("t1", "retry_test", "{}")),
            ProviderEvent::Done,
        ],
        ("retry_test", _) => vec![
            ProviderEvent::TextDelta(result_begin("r1", "AssistantReply")),
            ProviderEvent::TextDelta(r#"{"answer":"Retry attempts 2"}"#.to_string()),
            ProviderEvent::TextDelta(result_end()),
            ProviderEvent::Done,
        ],

        ("timeout_test", 0) => vec![
            ProviderEvent::TextDelta(tool_call_frame("t1", "timeout_test", "{}")),
            ProviderEvent::Done,
        ],
        ("timeout_test", _) => vec![
            ProviderEvent::TextDelta(result_begin("r1", "AssistantReply")),
            ProviderEvent::TextDelta(r#"{"answer":"The timeout_test tool timed out."}"#.to_string()),
            ProviderEvent::TextDelta(result_end()),
            ProviderEvent::Done,
        ],

        ("backpressure_test", _) => {
            let body = r#"{"answer":"This reply is deliberately split into many small delta chunks to exercise the emitter's backpressure path end to end."}"#;
            let mut events = vec![ProviderEvent::TextDelta(result_begin("r1", "AssistantReply"))];
            events.extend(split_chunks(body, 14).into_iter().map(ProviderEvent::TextDelta));
            events.push(ProviderEvent::TextDelta(result_end()));
            events.push(ProviderEvent::Done);
            events
        }

        ("repair_test", _) => vec![
            ProviderEvent::TextDelta(result_begin("r1", "AssistantReply")),
            // Missing the required `answer` field: fails validation and
            // forces the controller's one-shot repair path.
            ProviderEvent::TextDelta(r#"{"citations":[]}"#.to_string()),
            ProviderEvent::TextDelta(result_end()),
            ProviderEvent::Done,
        ],

        ("provider_fallback_test", _) => {
            vec![ProviderEvent::TextDelta("The model produced no frames this round.".to_string()), ProviderEvent::Done]
        }

        ("silence_test", _) => vec![],

        (_, _) => vec![
            ProviderEvent::TextDelta(result_begin("r1", "AssistantReply")),
            ProviderEvent::TextDelta(r#"{"answer":""}"#.to_string()),
            ProviderEvent::TextDelta(result_end()),
            ProviderEvent::Done,
        ],
    }
}

/// Scripted [`ProviderClient`]: resolves a deterministic event sequence
/// from `(mode, round_index)` and replays it. `silence_test` resolves to a
/// stream that never yields, exercising C6's frame-silence timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProviderClient;

impl MockProviderClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderClient for MockProviderClient {
    async fn stream(&self, request: CompletionRequest) -> Result<ProviderStream> {
        let mode = extract_mode(&request.messages);
        let round = round_index(&request.messages);
        let cancel = CancellationToken::new();

        if mode == "silence_test" {
            let cancel_for_stream = cancel.clone();
            let inert = stream::unfold(cancel_for_stream, |cancel| async move {
                cancel.cancelled().await;
                None
            });
            return Ok(ProviderStream::from_parts(Box::pin(inert.map(Ok)), cancel));
        }

        let events = events_for(&mode, round);
        Ok(ProviderStream::from_parts(Box::pin(stream::iter(events).map(Ok)), cancel))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(mode: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::system(format!("mode={mode}")), ChatMessage::user("hi")]
    }

    async fn collect(client: &MockProviderClient, mode: &str, rounds: usize) -> Vec<Vec<ProviderEvent>> {
        let mut out = Vec::new();
        let mut msgs = messages(mode);
        for _ in 0..rounds {
            let request = CompletionRequest {
                messages: msgs.clone(),
                model: "test".into(),
                temperature: 0.0,
                seed: 1,
                max_tokens: 10,
            };
            let mut s = client.stream(request).await.unwrap();
            let mut round_events = Vec::new();
            while let Some(ev) = s.next().await {
                round_events.push(ev.unwrap());
            }
            msgs.push(ChatMessage::assistant(format!("TOOL_RESULT id=t{} name=x\n{{}}", out.len())));
            out.push(round_events);
        }
        out
    }

    #[tokio::test]
    async fn happy_path_scripts_two_tool_rounds_then_a_result() {
        let client = MockProviderClient::new();
        let rounds = collect(&client, "", 3).await;
        assert!(matches!(rounds[0][1], ProviderEvent::TextDelta(ref s) if s.contains("places.search")));
        assert!(matches!(rounds[1][0], ProviderEvent::TextDelta(ref s) if s.contains("bookings.create")));
        assert!(rounds[2].iter().any(|e| matches!(e, ProviderEvent::TextDelta(s) if s.contains("Booked at"))));
    }

    #[tokio::test]
    async fn retry_test_round_zero_calls_the_retry_tool() {
        let client = MockProviderClient::new();
        let rounds = collect(&client, "retry_test", 1).await;
        assert!(matches!(rounds[0][0], ProviderEvent::TextDelta(ref s) if s.contains("name=retry_test")));
    }

    #[tokio::test]
    async fn backpressure_test_splits_the_result_into_many_deltas() {
        let client = MockProviderClient::new();
        let rounds = collect(&client, "backpressure_test", 1).await;
        let delta_count = rounds[0]
            .iter()
            .filter(|e| matches!(e, ProviderEvent::TextDelta(s) if !s.starts_with(OPEN)))
            .count();
        assert!(delta_count >= 10, "expected at least 10 body chunks, got {delta_count}");
    }

    #[tokio::test]
    async fn silence_test_never_yields() {
        let client = MockProviderClient::new();
        let request = CompletionRequest {
            messages: messages("silence_test"),
            model: "test".into(),
            temperature: 0.0,
            seed: 1,
            max_tokens: 10,
        };
        let mut s = client.stream(request).await.unwrap();
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), s.next()).await;
        assert!(next.is_err(), "silence_test stream should not yield within the timeout");
    }

    #[test]
    fn round_index_counts_tool_result_messages() {
        let msgs = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("TOOL_RESULT id=t1 name=x\n{}"),
            ChatMessage::assistant("TOOL_RESULT id=t2 name=y\n{}"),
        ];
        assert_eq!(round_index(&msgs), 2);
    }

    #[test]
    fn extract_mode_reads_the_system_message_token() {
        assert_eq!(extract_mode(&messages("retry_test")), "retry_test");
        assert_eq!(extract_mode(&[ChatMessage::user("hi")]), "");
    }
}
