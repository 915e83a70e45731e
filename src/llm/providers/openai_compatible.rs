//! Generic adapter for OpenAI-compatible chat-completions APIs
//! (OpenRouter, DashScope, vLLM, LM Studio, ...).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::llm::provider::{
    CallConfig, ModelProvider, ParseMode, RawModelOutput, ReasoningCallback, TokenUsage,
};
use crate::llm::sse::{self, SseEvent};
use crate::llm::tools;
use crate::parser::ToolInvocation;
use crate::perception::Frame;

pub struct OpenAiCompatProvider {
    id: String,
    api_base: String,
    api_key: String,
    parse_mode: ParseMode,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(id: String, api_base: String, api_key: String, parse_mode: ParseMode) -> Self {
        Self {
            id,
            api_base,
            api_key,
            parse_mode,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.id
    }

    fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    async fn call(
        &self,
        system_prompt: &str,
        user_text: &str,
        frame: &Frame,
        cfg: &CallConfig,
        on_reasoning: Option<ReasoningCallback<'_>>,
    ) -> AgentResult<RawModelOutput> {
        let image_url = format!("data:image/png;base64,{}", frame.to_png_base64()?);
        let messages = serde_json::json!([
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": image_url}},
                {"type": "text", "text": user_text},
            ]},
        ]);

        let mut body = serde_json::json!({
            "model": cfg.model,
            "messages": messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });
        if cfg.stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        if self.parse_mode == ParseMode::ToolCall {
            body["tools"] = Value::Array(tools::action_tools());
            body["tool_choice"] = serde_json::json!("auto");
        }

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            "sending model request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            let lowered = err_body.to_lowercase();
            if status.as_u16() == 429
                || lowered.contains("rate limit")
                || lowered.contains("overloaded")
            {
                return Err(AgentError::RateLimited(format!("{status}: {err_body}")));
            }
            return Err(AgentError::Provider(format!("{status}: {err_body}")));
        }

        if cfg.stream {
            self.handle_stream(response, on_reasoning).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatProvider {
    /// Consume an SSE stream, forwarding reasoning deltas as they arrive and
    /// accumulating the full response.
    async fn handle_stream(
        &self,
        response: reqwest::Response,
        on_reasoning: Option<ReasoningCallback<'_>>,
    ) -> AgentResult<RawModelOutput> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf = String::new();

        let mut content = String::new();
        let mut reasoning = String::new();
        // Delta index -> (name, accumulated argument string).
        let mut tc_builders: BTreeMap<usize, (String, String)> = BTreeMap::new();
        let mut usage: Option<TokenUsage> = None;
        // How much of an inline <think> block has already been forwarded.
        let mut think_forwarded = 0usize;

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result?;
            let text = String::from_utf8_lossy(&bytes);

            for ch in text.chars() {
                if ch != '\n' {
                    line_buf.push(ch);
                    continue;
                }
                let line = line_buf.trim().to_string();
                line_buf.clear();
                if line.is_empty() {
                    continue;
                }

                match sse::parse_sse_line(&line) {
                    Ok(Some(SseEvent::Reasoning(delta))) => {
                        reasoning.push_str(&delta);
                        if let Some(cb) = on_reasoning {
                            cb(&delta, &reasoning);
                        }
                    }
                    Ok(Some(SseEvent::Content(delta))) => {
                        content.push_str(&delta);
                        // Tagged models without a reasoning channel stream
                        // their rationale inside a leading <think> block.
                        if reasoning.is_empty() {
                            if let Some(inner) = partial_think(&content) {
                                if inner.len() > think_forwarded {
                                    if let Some(cb) = on_reasoning {
                                        cb(&inner[think_forwarded..], inner);
                                    }
                                    think_forwarded = inner.len();
                                }
                            }
                        }
                    }
                    Ok(Some(SseEvent::ToolCallDelta(deltas))) => {
                        merge_tool_call_deltas(&deltas, &mut tc_builders);
                    }
                    Ok(Some(SseEvent::Usage(u))) => usage = Some(u),
                    Ok(Some(SseEvent::Done)) => break 'stream,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "skipped malformed SSE line");
                    }
                }
            }
        }

        let tool_calls = build_tool_calls(tc_builders);
        tracing::info!(
            provider = %self.id,
            content_len = content.len(),
            reasoning_len = reasoning.len(),
            tool_calls = tool_calls.len(),
            "model stream complete"
        );

        Ok(RawModelOutput {
            text: content,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            tool_calls,
            usage,
        })
    }

    async fn handle_json(&self, response: reqwest::Response) -> AgentResult<RawModelOutput> {
        let json: Value = response.json().await?;
        let message = &json["choices"][0]["message"];

        let text = message["content"].as_str().unwrap_or("").to_string();
        let reasoning = ["reasoning_content", "reasoning"]
            .iter()
            .find_map(|key| message[*key].as_str())
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|tc| {
                        let name = tc["function"]["name"].as_str()?;
                        let arguments = tc["function"]["arguments"]
                            .as_str()
                            .unwrap_or("{}")
                            .to_string();
                        Some(ToolInvocation::new(name, Value::String(arguments)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!(
            provider = %self.id,
            content_len = text.len(),
            "model response received"
        );

        Ok(RawModelOutput {
            text,
            reasoning,
            tool_calls,
            usage: sse::parse_usage(&json["usage"]),
        })
    }
}

/// The inside of a leading `<think>` block, as far as it has streamed.
/// `None` until the opening tag has fully arrived.
fn partial_think(content: &str) -> Option<&str> {
    let rest = content.trim_start().strip_prefix("<think>")?;
    Some(match rest.find("</think>") {
        Some(end) => &rest[..end],
        None => rest,
    })
}

fn merge_tool_call_deltas(deltas: &[Value], builders: &mut BTreeMap<usize, (String, String)>) {
    for delta in deltas {
        let idx = delta["index"].as_u64().unwrap_or(0) as usize;
        let entry = builders.entry(idx).or_default();
        if let Some(name) = delta["function"]["name"].as_str() {
            entry.0.push_str(name);
        }
        if let Some(args) = delta["function"]["arguments"].as_str() {
            entry.1.push_str(args);
        }
    }
}

fn build_tool_calls(builders: BTreeMap<usize, (String, String)>) -> Vec<ToolInvocation> {
    builders
        .into_values()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, arguments)| ToolInvocation::new(name, Value::String(arguments)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_think_tracks_an_unclosed_block() {
        assert_eq!(partial_think("<think>the scr"), Some("the scr"));
        assert_eq!(partial_think("<think>done</think><action>click"), Some("done"));
        assert_eq!(partial_think("<thin"), None);
        assert_eq!(partial_think("<action>click</action>"), None);
    }

    #[test]
    fn tool_call_deltas_merge_by_index() {
        let mut builders = BTreeMap::new();
        merge_tool_call_deltas(
            &[json!({"index": 0, "function": {"name": "cli", "arguments": "{\"x\""}})],
            &mut builders,
        );
        merge_tool_call_deltas(
            &[json!({"index": 0, "function": {"name": "ck", "arguments": ": 5}"}})],
            &mut builders,
        );
        let calls = build_tool_calls(builders);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "click");
        assert_eq!(calls[0].arguments, Value::String("{\"x\": 5}".into()));
    }

    #[test]
    fn nameless_builders_are_dropped() {
        let mut builders = BTreeMap::new();
        merge_tool_call_deltas(
            &[json!({"index": 0, "function": {"arguments": "{}"}})],
            &mut builders,
        );
        assert!(build_tool_calls(builders).is_empty());
    }
}
