//! Per-session artifacts sink (C11, ambient): durably records one
//! session's wire conversation and outcome under `artifacts/<session-id>/`,
//! one directory per session rather than one rotating file per process.

pub mod error;

pub use error::{ArtifactsError, Result};

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use sentinel_types::{now_ms, SessionMetrics};

const FRAMES_FILE: &str = "frames.ndjson";
const PROMPT_FILE: &str = "prompt.json";
const RESULT_FILE: &str = "result.json";
const METRICS_FILE: &str = "metrics.json";

/// One instance per session, owning `artifacts/<session-id>/` exclusively
/// for the session's lifetime (no read-modify-write races). `frames.ndjson`
/// is append-only; the other files are single-shot overwrites.
pub struct ArtifactsSink {
    dir: PathBuf,
    frames: Mutex<BufWriter<File>>,
}

impl ArtifactsSink {
    /// Create (or reopen) the session directory under `artifacts_dir` and
    /// open `frames.ndjson` for append.
    pub fn new(artifacts_dir: &str, session_id: &str) -> Result<Self> {
        let dir = Path::new(artifacts_dir).join(session_id);
        fs::create_dir_all(&dir).map_err(|source| ArtifactsError::CreateDir { path: dir.clone(), source })?;

        let frames_path = dir.join(FRAMES_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&frames_path)
            .map_err(|source| ArtifactsError::Write { path: frames_path, source })?;

        Ok(Self { dir, frames: Mutex::new(BufWriter::new(file)) })
    }

    /// Write `prompt.json` once, combining the inbound request with the
    /// deterministic parameters the controller resolved for it.
    pub fn write_prompt(&self, doc: &Value) -> Result<()> {
        self.overwrite(PROMPT_FILE, doc)
    }

    /// Append one `{t, event, data}` line per emitted wire event, so the
    /// file is a faithful replay log of exactly what C5 sent.
    pub fn append_frame(&self, event: &str, data: &Value) -> Result<()> {
        let line = serde_json::to_string(&serde_json::json!({
            "t": now_ms(),
            "event": event,
            "data": data,
        }))?;
        let path = self.dir.join(FRAMES_FILE);
        let mut writer = self.frames.lock();
        writeln!(writer, "{line}").map_err(|source| ArtifactsError::Write { path: path.clone(), source })?;
        writer.flush().map_err(|source| ArtifactsError::Write { path, source })
    }

    /// Overwrite `result.json` with the last reply object, if any.
    pub fn write_result(&self, reply: &Value) -> Result<()> {
        self.overwrite(RESULT_FILE, reply)
    }

    /// Write `metrics.json` at session finish.
    pub fn write_metrics(&self, metrics: &SessionMetrics) -> Result<()> {
        let value = serde_json::to_value(metrics)?;
        self.overwrite(METRICS_FILE, &value)
    }

    fn overwrite(&self, name: &str, value: &Value) -> Result<()> {
        let path = self.dir.join(name);
        let body = serde_json::to_vec_pretty(value)?;
        fs::write(&path, body).map_err(|source| ArtifactsError::Write { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn write_prompt_writes_a_single_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
        sink.write_prompt(&json!({"prompt": "hi", "model": "gpt-4o-mini"})).unwrap();
        let doc = read_json(&dir.path().join("s1").join(PROMPT_FILE));
        assert_eq!(doc["prompt"], json!("hi"));
    }

    #[test]
    fn append_frame_appends_ndjson_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
        sink.append_frame("json.begin", &json!({"id": "a"})).unwrap();
        sink.append_frame("json.end", &json!({"id": "a"})).unwrap();

        let content = fs::read_to_string(dir.path().join("s1").join(FRAMES_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], json!("json.begin"));
        assert!(first["t"].is_u64());
    }

    #[test]
    fn write_result_overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
        sink.write_result(&json!({"answer": "first"})).unwrap();
        sink.write_result(&json!({"answer": "second"})).unwrap();
        let doc = read_json(&dir.path().join("s1").join(RESULT_FILE));
        assert_eq!(doc["answer"], json!("second"));
    }

    #[test]
    fn write_metrics_serializes_session_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
        let metrics = SessionMetrics {
            total_ms: 42,
            tool_latency_ms: Some(10),
            model: "gpt-4o-mini".to_string(),
            validation: Default::default(),
            degraded: false,
        };
        sink.write_metrics(&metrics).unwrap();
        let doc = read_json(&dir.path().join("s1").join(METRICS_FILE));
        assert_eq!(doc["total_ms"], json!(42));
        assert_eq!(doc["degraded"], json!(false));
    }

    #[test]
    fn reopening_the_same_session_directory_keeps_appending() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
            sink.append_frame("json.begin", &json!({"id": "a"})).unwrap();
        }
        let sink = ArtifactsSink::new(dir.path().to_str().unwrap(), "s1").unwrap();
        sink.append_frame("json.end", &json!({"id": "a"})).unwrap();
        let content = fs::read_to_string(dir.path().join("s1").join(FRAMES_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
