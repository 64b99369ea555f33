//! Sentinel tokenizer: turns an arbitrarily-chunked provider token stream
//! into an ordered sequence of frame lifecycle events.

mod event;
mod parser;

pub use event::TokenEvent;
pub use parser::SentinelTokenizer;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed_all(tok: &mut SentinelTokenizer, chunks: &[&str]) -> Vec<TokenEvent> {
        let mut out = Vec::new();
        for c in chunks {
            out.extend(tok.feed(c));
        }
        out
    }

    #[test]
    fn plain_text_passes_through() {
        let mut tok = SentinelTokenizer::new();
        let events = tok.feed("hello world");
        assert_eq!(events, vec![TokenEvent::Text { chunk: "hello world".into() }]);
    }

    #[test]
    fn object_frame_round_trip_single_chunk() {
        let mut tok = SentinelTokenizer::new();
        let events = tok.feed("\u{27E6}BEGIN_OBJECT id=a1 schema=Action\u{27E7}{\"x\":1}\u{27E6}END_OBJECT id=a1 schema=Action\u{27E7}");
        assert_eq!(
            events,
            vec![
                TokenEvent::JsonBegin { id: "a1".into(), schema: "Action".into() },
                TokenEvent::JsonDelta { id: "a1".into(), chunk: "{\"x\":1}".into() },
                TokenEvent::JsonEnd { id: "a1".into(), length: 7 },
            ]
        );
    }

    #[test]
    fn object_frame_split_across_many_feeds() {
        let mut tok = SentinelTokenizer::new();
        let mut events = Vec::new();
        events.extend(tok.feed("\u{27E6}BEGIN_OB"));
        events.extend(tok.feed("JECT id=a1 sch"));
        events.extend(tok.feed("ema=Action\u{27E7}{\"x\":"));
        events.extend(tok.feed("1}\u{27E6}END_OB"));
        events.extend(tok.feed("JECT id=a1 schema=Action\u{27E7}"));

        assert_eq!(events[0], TokenEvent::JsonBegin { id: "a1".into(), schema: "Action".into() });
        let deltas: String = events
            .iter()
            .filter_map(|e| match e {
                TokenEvent::JsonDelta { chunk, .. } => Some(chunk.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, "{\"x\":1}");
        assert!(matches!(events.last(), Some(TokenEvent::JsonEnd { length: 7, .. })));
    }

    #[test]
    fn sentinel_bracket_inside_json_string_is_not_a_frame_end() {
        let mut tok = SentinelTokenizer::new();
        let body = "{\"note\":\"looks like \u{27E6}END_OBJECT\u{27E7} but is not\"}";
        let events = tok.feed(&format!(
            "\u{27E6}BEGIN_OBJECT id=a1 schema=Note\u{27E7}{body}\u{27E6}END_OBJECT id=a1 schema=Note\u{27E7}"
        ));
        let delta: String = events
            .iter()
            .filter_map(|e| match e {
                TokenEvent::JsonDelta { chunk, .. } => Some(chunk.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(delta, body);
        assert!(matches!(events.last(), Some(TokenEvent::JsonEnd { .. })));
        let parsed: serde_json::Value = serde_json::from_str(&delta).unwrap();
        assert_eq!(parsed["note"], json!("looks like \u{27E6}END_OBJECT\u{27E7} but is not"));
    }

    #[test]
    fn escaped_quote_does_not_toggle_string_state() {
        let mut tok = SentinelTokenizer::new();
        let body = r#"{"msg":"she said \"hi\""}"#;
        let events = tok.feed(&format!(
            "\u{27E6}BEGIN_OBJECT id=a1 schema=Note\u{27E7}{body}\u{27E6}END_OBJECT id=a1 schema=Note\u{27E7}"
        ));
        assert!(matches!(events.last(), Some(TokenEvent::JsonEnd { .. })));
    }

    #[test]
    fn windows_path_backslashes_do_not_break_string_tracking() {
        let mut tok = SentinelTokenizer::new();
        let body = r#"{"path":"C:\\Users\\name\\file.txt"}"#;
        let events = tok.feed(&format!(
            "\u{27E6}BEGIN_OBJECT id=a1 schema=Note\u{27E7}{body}\u{27E6}END_OBJECT id=a1 schema=Note\u{27E7}"
        ));
        let delta: String = events
            .iter()
            .filter_map(|e| match e {
                TokenEvent::JsonDelta { chunk, .. } => Some(chunk.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(delta, body);
    }

    #[test]
    fn tool_call_emits_single_event_at_close() {
        let mut tok = SentinelTokenizer::new();
        let events = feed_all(
            &mut tok,
            &[
                "\u{27E6}BEGIN_TOOL_CALL id=t1 name=places.search\u{27E7}",
                "{\"query\":\"pizza\"}",
                "\u{27E6}END_TOOL_CALL id=t1 name=places.search\u{27E7}",
            ],
        );
        assert_eq!(
            events,
            vec![TokenEvent::ToolCall {
                id: "t1".into(),
                name: "places.search".into(),
                args: Some(json!({"query": "pizza"})),
            }]
        );
    }

    #[test]
    fn tool_call_with_invalid_json_body_reports_null_args() {
        let mut tok = SentinelTokenizer::new();
        let events = feed_all(
            &mut tok,
            &[
                "\u{27E6}BEGIN_TOOL_CALL id=t1 name=broken\u{27E7}",
                "{not json",
                "\u{27E6}END_TOOL_CALL id=t1 name=broken\u{27E7}",
            ],
        );
        assert_eq!(
            events,
            vec![TokenEvent::ToolCall {
                id: "t1".into(),
                name: "broken".into(),
                args: None,
            }]
        );
    }

    #[test]
    fn malformed_header_is_emitted_as_text_and_scanning_continues() {
        let mut tok = SentinelTokenizer::new();
        let events = tok.feed(
            "\u{27E6}BEGIN_NONSENSE oops\u{27E7}\u{27E6}BEGIN_OBJECT id=a1 schema=Action\u{27E7}{}\u{27E6}END_OBJECT id=a1 schema=Action\u{27E7}",
        );
        assert!(matches!(events[0], TokenEvent::Text { .. }));
        assert!(matches!(events[1], TokenEvent::JsonBegin { .. }));
    }

    #[test]
    fn stray_end_sentinel_with_no_open_is_plain_text() {
        let mut tok = SentinelTokenizer::new();
        let events = tok.feed("before \u{27E6}END_OBJECT id=x schema=Y\u{27E7} after");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TokenEvent::Text { chunk } if chunk.contains("END_OBJECT")));
    }

    #[test]
    fn no_empty_deltas_are_emitted() {
        let mut tok = SentinelTokenizer::new();
        let events = feed_all(
            &mut tok,
            &[
                "\u{27E6}BEGIN_RESULT id=r1 schema=AssistantReply\u{27E7}",
                "",
                "\u{27E6}END_RESULT id=r1 schema=AssistantReply\u{27E7}",
            ],
        );
        for e in &events {
            if let TokenEvent::ResultDelta { chunk, .. } = e {
                assert!(!chunk.is_empty());
            }
        }
    }
}
