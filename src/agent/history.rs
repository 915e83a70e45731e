//! Per-step records and the sink they are handed to.
//!
//! Records are owned by the engine, appended once and never mutated; a sink
//! is purely a consumer with no feedback into control flow.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::action::ParsedResponse;
use crate::llm::provider::TokenUsage;

/// Everything one executed step produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: u32,
    pub ts: i64,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<String>,
    pub parsed: ParsedResponse,
    pub results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

pub trait HistorySink: Send {
    fn record(&mut self, record: &StepRecord);
    /// Called exactly once with the terminal reason for the run.
    fn finalize(&mut self, reason: &str);
}

/// Sink for runs that do not persist anything.
pub struct NullSink;

impl HistorySink for NullSink {
    fn record(&mut self, _record: &StepRecord) {}
    fn finalize(&mut self, _reason: &str) {}
}

/// Appends one JSON line per step under the platform data directory, plus a
/// header at start and a summary line at finalize. Write failures are
/// logged, never propagated; losing a log line must not kill a run.
pub struct JsonlHistorySink {
    pub session_id: String,
    path: PathBuf,
    steps_written: u32,
}

impl JsonlHistorySink {
    pub fn new(goal: &str) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("screenpilot")
            .join("sessions");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(error = %e, "could not create session directory");
        }
        let path = dir.join(format!("session_{session_id}.jsonl"));
        let mut sink = Self {
            session_id,
            path,
            steps_written: 0,
        };
        sink.append(&serde_json::json!({
            "goal": goal,
            "started_at": chrono::Utc::now().to_rfc3339(),
        }));
        tracing::info!(path = %sink.path.display(), "session log opened");
        sink
    }

    fn append<T: Serialize>(&mut self, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize history entry");
                return;
            }
        };
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "history write failed");
        }
    }
}

impl HistorySink for JsonlHistorySink {
    fn record(&mut self, record: &StepRecord) {
        self.steps_written += 1;
        self.append(record);
    }

    fn finalize(&mut self, reason: &str) {
        let summary = serde_json::json!({
            "end_reason": reason,
            "total_steps": self.steps_written,
            "ended_at": chrono::Utc::now().to_rfc3339(),
        });
        self.append(&summary);
        tracing::info!(
            session = %self.session_id,
            reason = %reason,
            steps = self.steps_written,
            "session finalized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ParsedAction};

    #[test]
    fn step_record_serializes_with_parsed_response() {
        let record = StepRecord {
            step: 1,
            ts: 0,
            raw: "<action>done</action>".into(),
            think: None,
            parsed: ParsedResponse::Single {
                action: ParsedAction::bare(Action::Done { reason: None }),
            },
            results: vec!["done".into()],
            usage: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["step"], 1);
        assert_eq!(json["parsed"]["kind"], "single");
        assert_eq!(json["parsed"]["action"]["action"]["action"], "done");
    }
}
