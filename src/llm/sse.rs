//! Line-level parser for OpenAI-compatible SSE streams.

use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::llm::provider::TokenUsage;

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Reasoning(String),
    Content(String),
    /// Raw `tool_calls` delta fragments, merged by the provider.
    ToolCallDelta(Vec<Value>),
    /// Usage chunk, sent with empty `choices` when the request asked for
    /// `stream_options.include_usage`.
    Usage(TokenUsage),
    Done,
}

/// Parses a raw SSE line into an [`SseEvent`]. Returns `None` for
/// keep-alives, comments, and chunks carrying nothing of interest.
pub fn parse_sse_line(line: &str) -> AgentResult<Option<SseEvent>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data: ").map(str::trim) else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let json: Value =
        serde_json::from_str(data).map_err(|e| AgentError::SseParsing(e.to_string()))?;

    if let Some(first) = json["choices"].as_array().and_then(|c| c.first()) {
        let delta = &first["delta"];

        // Reasoning channel (DeepSeek-style `reasoning_content`, OpenRouter
        // `reasoning`).
        for key in ["reasoning_content", "reasoning"] {
            if let Some(reasoning) = delta[key].as_str() {
                if !reasoning.is_empty() {
                    return Ok(Some(SseEvent::Reasoning(reasoning.to_string())));
                }
            }
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            if !tool_calls.is_empty() {
                return Ok(Some(SseEvent::ToolCallDelta(tool_calls.clone())));
            }
        }

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                return Ok(Some(SseEvent::Content(content.to_string())));
            }
        }

        if first["finish_reason"].as_str().is_some() {
            return Ok(Some(SseEvent::Done));
        }

        return Ok(None);
    }

    // Usage arrives on a trailing chunk with no choices.
    if let Some(usage) = parse_usage(&json["usage"]) {
        return Ok(Some(SseEvent::Usage(usage)));
    }

    Ok(None)
}

pub(crate) fn parse_usage(value: &Value) -> Option<TokenUsage> {
    if !value.is_object() {
        return None;
    }
    Some(TokenUsage {
        prompt: value["prompt_tokens"].as_u64().unwrap_or(0),
        completion: value["completion_tokens"].as_u64().unwrap_or(0),
        total: value["total_tokens"].as_u64().unwrap_or(0),
    })
}
