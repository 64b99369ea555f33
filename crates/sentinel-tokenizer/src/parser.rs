//! Push-driven sentinel tokenizer and frame demultiplexer.
//!
//! The caller feeds text chunks of arbitrary size and boundaries via
//! [`SentinelTokenizer::feed`]; the parser returns a totally ordered
//! sequence of [`TokenEvent`]s. The parser never backtracks across an
//! already-returned event: everything it needs to resume correctly lives
//! in its own state, not in data the caller must re-present.

use std::sync::OnceLock;

use regex::Regex;
use sentinel_types::{FrameKind, FrameState};

use crate::event::TokenEvent;

const OPEN: char = '\u{27E6}'; // ⟦
const CLOSE: char = '\u{27E7}'; // ⟧

fn begin_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\u{27E6}BEGIN_OBJECT id=(\S+) schema=(\S+)\u{27E7}$").unwrap())
}

fn begin_tool_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\u{27E6}BEGIN_TOOL_CALL id=(\S+) name=(\S+)\u{27E7}$").unwrap())
}

fn begin_result_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\u{27E6}BEGIN_RESULT id=(\S+) schema=(\S+)\u{27E7}$").unwrap())
}

const BEGIN_MARKER: &str = "\u{27E6}BEGIN_";
const END_PREFIX: [char; 4] = ['E', 'N', 'D', '_'];

#[derive(Debug)]
enum State {
    Outside,
    Inside(FrameState),
}

/// Restart-safe, push-driven sentinel scanner.
///
/// One instance owns exactly one frame-stream's worth of state; a session
/// creates a fresh tokenizer per request.
pub struct SentinelTokenizer {
    state: State,
    /// Characters accumulated for the region currently being scanned: the
    /// header buffer while `Outside`, the frame body while `Inside`.
    buf: Vec<char>,
    /// How much of `buf` has already been surfaced as a `Text`/`*Delta`
    /// event to the caller.
    emitted: usize,
    /// JSON-string tracking, persists across `feed` calls while `Inside`.
    in_string: bool,
    prev_escape: bool,
}

impl Default for SentinelTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentinelTokenizer {
    pub fn new() -> Self {
        Self {
            state: State::Outside,
            buf: Vec::new(),
            emitted: 0,
            in_string: false,
            prev_escape: false,
        }
    }

    /// Feed the next chunk of provider text. Returns every event the chunk
    /// causes, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<TokenEvent> {
        self.buf.extend(chunk.chars());
        let mut events = Vec::new();
        loop {
            let progressed = match &self.state {
                State::Outside => self.step_outside(&mut events),
                State::Inside(_) => self.step_inside(&mut events),
            };
            if !progressed {
                break;
            }
        }
        events
    }

    /// Drop the scanned-but-not-yet-emitted prefix of `buf`, keeping the
    /// buffer from growing without bound across a long session.
    fn compact(&mut self, keep_from: usize) {
        if keep_from == 0 {
            return;
        }
        self.buf.drain(0..keep_from);
        self.emitted = self.emitted.saturating_sub(keep_from);
    }

    fn step_outside(&mut self, events: &mut Vec<TokenEvent>) -> bool {
        let haystack: String = self.buf.iter().collect();
        let Some(byte_idx) = haystack.find(BEGIN_MARKER) else {
            // No candidate header anywhere. Emit everything except a
            // trailing partial match of the marker itself.
            let retain = partial_suffix_match(&self.buf, &marker_chars());
            let cut = self.buf.len() - retain;
            if cut > 0 {
                let text: String = self.buf[..cut].iter().collect();
                events.push(TokenEvent::Text { chunk: text });
                self.compact(cut);
            }
            return false;
        };
        let char_idx = haystack[..byte_idx].chars().count();
        if char_idx > 0 {
            let text: String = self.buf[..char_idx].iter().collect();
            events.push(TokenEvent::Text { chunk: text });
            self.compact(char_idx);
        }
        // buf now starts at the marker. Find the header's closing bracket.
        let Some(close_rel) = self.buf.iter().skip(1).position(|&c| c == CLOSE) else {
            // Header incomplete; wait for more input.
            return false;
        };
        let close_idx = close_rel + 1;
        let header: String = self.buf[..=close_idx].iter().collect();
        let consumed = close_idx + 1;

        if let Some(caps) = begin_object_re().captures(&header) {
            let id = caps[1].to_string();
            let schema = caps[2].to_string();
            events.push(TokenEvent::JsonBegin {
                id: id.clone(),
                schema: schema.clone(),
            });
            self.state = State::Inside(FrameState::new(FrameKind::Object, id, schema));
            self.reset_body_scan();
        } else if let Some(caps) = begin_tool_re().captures(&header) {
            let id = caps[1].to_string();
            let name = caps[2].to_string();
            self.state = State::Inside(FrameState::new(FrameKind::Tool, id, name));
            self.reset_body_scan();
        } else if let Some(caps) = begin_result_re().captures(&header) {
            let id = caps[1].to_string();
            let schema = caps[2].to_string();
            events.push(TokenEvent::ResultBegin {
                id: id.clone(),
                schema: schema.clone(),
            });
            self.state = State::Inside(FrameState::new(FrameKind::Result, id, schema));
            self.reset_body_scan();
        } else {
            // Malformed header shape: ignore as ordinary text and keep
            // scanning the rest of the buffer for a real one.
            events.push(TokenEvent::Text { chunk: header });
        }
        self.compact(consumed);
        true
    }

    fn reset_body_scan(&mut self) {
        self.emitted = 0;
        self.in_string = false;
        self.prev_escape = false;
    }

    fn step_inside(&mut self, events: &mut Vec<TokenEvent>) -> bool {
        let mut i = self.emitted;
        while i < self.buf.len() {
            let ch = self.buf[i];

            if self.prev_escape {
                self.prev_escape = false;
                i += 1;
                continue;
            }
            if ch == '\\' && self.in_string {
                self.prev_escape = true;
                i += 1;
                continue;
            }
            if ch == '"' {
                self.in_string = !self.in_string;
                i += 1;
                continue;
            }
            if !self.in_string && ch == OPEN {
                match match_end_sentinel(&self.buf, i) {
                    SentinelMatch::Complete(end_excl) => {
                        return self.close_frame(events, i, end_excl);
                    }
                    SentinelMatch::Incomplete => {
                        // Might become a sentinel with more input; stop
                        // scanning here without consuming it.
                        return self.flush_body_delta(events, i);
                    }
                    SentinelMatch::No => {
                        i += 1;
                        continue;
                    }
                }
            }
            i += 1;
        }
        // Reached end of buffered input without finding a sentinel.
        self.flush_body_delta(events, i)
    }

    /// Emit a delta covering `self.emitted..upto` (if non-empty) and park
    /// the scan cursor there. Returns whether anything changed.
    fn flush_body_delta(&mut self, events: &mut Vec<TokenEvent>, upto: usize) -> bool {
        if upto <= self.emitted {
            return false;
        }
        let chunk: String = self.buf[self.emitted..upto].iter().collect();
        if !chunk.is_empty() {
            let State::Inside(frame) = &mut self.state else {
                unreachable!("flush_body_delta called outside Inside state")
            };
            frame.accumulated_bytes.push_str(&chunk);
            match frame.kind {
                FrameKind::Object => events.push(TokenEvent::JsonDelta {
                    id: frame.id.clone(),
                    chunk,
                }),
                FrameKind::Result => events.push(TokenEvent::ResultDelta {
                    id: frame.id.clone(),
                    chunk,
                }),
                FrameKind::Tool => {
                    // Tool bodies are buffered only; no delta event.
                }
            }
        }
        self.emitted = upto;
        false
    }

    /// `body_end` is the index (exclusive) of the frame body content; the
    /// sentinel itself occupies `[body_end, sentinel_end)`.
    fn close_frame(&mut self, events: &mut Vec<TokenEvent>, body_end: usize, sentinel_end: usize) -> bool {
        if body_end > self.emitted {
            let chunk: String = self.buf[self.emitted..body_end].iter().collect();
            if !chunk.is_empty() {
                let State::Inside(frame) = &self.state else {
                    unreachable!()
                };
                match frame.kind {
                    FrameKind::Object => events.push(TokenEvent::JsonDelta {
                        id: frame.id.clone(),
                        chunk: chunk.clone(),
                    }),
                    FrameKind::Result => events.push(TokenEvent::ResultDelta {
                        id: frame.id.clone(),
                        chunk: chunk.clone(),
                    }),
                    FrameKind::Tool => {}
                }
                if let State::Inside(frame) = &mut self.state {
                    frame.accumulated_bytes.push_str(&chunk);
                }
            }
        }

        let State::Inside(frame) = std::mem::replace(&mut self.state, State::Outside) else {
            unreachable!()
        };
        let length = frame.accumulated_bytes.len();
        match frame.kind {
            FrameKind::Object => events.push(TokenEvent::JsonEnd {
                id: frame.id.clone(),
                length,
            }),
            FrameKind::Result => events.push(TokenEvent::ResultEnd {
                id: frame.id.clone(),
                length,
            }),
            FrameKind::Tool => {
                let parsed = serde_json::from_str::<serde_json::Value>(&frame.accumulated_bytes).ok();
                events.push(TokenEvent::ToolCall {
                    id: frame.id.clone(),
                    name: frame.schema_or_name.clone(),
                    args: parsed,
                });
            }
        }

        self.compact(sentinel_end);
        self.emitted = 0;
        self.in_string = false;
        self.prev_escape = false;
        true
    }
}

enum SentinelMatch {
    Complete(usize),
    Incomplete,
    No,
}

/// `open_idx` points at an `OPEN` bracket with `in_string == false`. Check
/// whether it begins a complete `⟦END_...⟧` sequence.
fn match_end_sentinel(buf: &[char], open_idx: usize) -> SentinelMatch {
    let mut i = open_idx + 1;
    for expect in END_PREFIX {
        match buf.get(i) {
            Some(&c) if c == expect => i += 1,
            Some(_) => return SentinelMatch::No,
            None => return SentinelMatch::Incomplete,
        }
    }
    match buf[i..].iter().position(|&c| c == CLOSE) {
        Some(rel) => SentinelMatch::Complete(i + rel + 1),
        None => SentinelMatch::Incomplete,
    }
}

fn marker_chars() -> Vec<char> {
    BEGIN_MARKER.chars().collect()
}

/// Longest suffix of `haystack` that is a prefix of `needle`, used to avoid
/// emitting text that might turn out to be the start of a sentinel once
/// more input arrives.
fn partial_suffix_match(haystack: &[char], needle: &[char]) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    for len in (1..=max).rev() {
        if haystack[haystack.len() - len..] == needle[..len] {
            return len;
        }
    }
    0
}
