//! The step-loop controller: capture → model call → parse → execute → wait,
//! repeated until the model declares done, the step budget runs out, the
//! user stops the run, or something unrecoverable happens.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::action::{Action, ParsedResponse};
use crate::agent::control::ControlHandle;
use crate::agent::events::{AgentEvent, EventBus};
use crate::agent::history::{HistorySink, StepRecord};
use crate::errors::{AgentError, AgentResult};
use crate::executor::{is_error_result, ActionExecutor};
use crate::llm::provider::{CallConfig, ModelProvider, ParseMode, RawModelOutput, TokenUsage};
use crate::parser;
use crate::perception::{frames_similar, Frame, ScreenCapture};
use crate::prompts;

/// Consecutive unchanged captures before the stagnation warning enters the
/// prompt.
const STAGNATION_WARNING_AFTER: u32 = 2;

/// Appended (once) to a transcript line whose follow-up capture showed no
/// visual change.
pub const STAGNANT_MARKER: &str = "[screen unchanged]";

/// Rate-limit retries before the run fails: backoff 2s, 4s, 8s, then fatal.
const RATE_LIMIT_RETRIES: u32 = 3;

/// Pause between actions inside a blind sequence.
const SEQUENCE_ACTION_GAP: Duration = Duration::from_millis(300);

/// Why the run ended. `reason_str` is the machine-readable form shared by
/// the history sink and any UI transition logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The model declared the goal accomplished.
    Done(String),
    /// Step budget exhausted without completion. Normal, not an error.
    MaxSteps,
    StoppedByUser,
    Failed(String),
}

impl EndReason {
    pub fn reason_str(&self) -> &str {
        match self {
            EndReason::Done(_) => "done",
            EndReason::MaxSteps => "max_steps",
            EndReason::StoppedByUser => "stopped_by_user",
            EndReason::Failed(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EndReason::Failed(_))
    }
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunOutcome {
    pub reason: EndReason,
    pub records: Vec<StepRecord>,
    /// Human-readable one-line-per-step log, as fed back into prompts.
    pub transcript: Vec<String>,
    pub usage: TokenUsage,
    pub llm_calls: u32,
}

#[derive(Default)]
struct RunContext {
    transcript: Vec<String>,
    records: Vec<StepRecord>,
    totals: TokenUsage,
    llm_calls: u32,
}

pub struct StepEngine {
    provider: Arc<dyn ModelProvider>,
    capture: Box<dyn ScreenCapture>,
    executor: Box<dyn ActionExecutor>,
    sink: Box<dyn HistorySink>,
    bus: EventBus,
    control: ControlHandle,
    call_config: CallConfig,
}

impl StepEngine {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        capture: Box<dyn ScreenCapture>,
        executor: Box<dyn ActionExecutor>,
        sink: Box<dyn HistorySink>,
        bus: EventBus,
        control: ControlHandle,
        call_config: CallConfig,
    ) -> Self {
        Self {
            provider,
            capture,
            executor,
            sink,
            bus,
            control,
            call_config,
        }
    }

    /// Drive the run to completion. Consumes the engine; one engine, one run.
    pub async fn run(mut self, goal: &str) -> RunOutcome {
        let mut ctx = RunContext::default();
        let reason = self.drive(goal, &mut ctx).await;

        match &reason {
            EndReason::Failed(message) => {
                tracing::error!(error = %message, "run failed");
                self.bus.emit(AgentEvent::RunError {
                    message: message.clone(),
                });
            }
            other => {
                let detail = match other {
                    EndReason::Done(done_reason) => Some(done_reason.clone()),
                    _ => None,
                };
                tracing::info!(reason = %other.reason_str(), "run finished");
                self.bus.emit(AgentEvent::RunFinished {
                    reason: other.reason_str().to_string(),
                    detail,
                });
            }
        }
        self.sink.finalize(reason.reason_str());

        RunOutcome {
            reason,
            records: ctx.records,
            transcript: ctx.transcript,
            usage: ctx.totals,
            llm_calls: ctx.llm_calls,
        }
    }

    async fn drive(&mut self, goal: &str, ctx: &mut RunContext) -> EndReason {
        let system_prompt = prompts::build_system_prompt(self.provider.parse_mode());

        self.bus.emit(AgentEvent::RunStarted {
            goal: goal.to_string(),
            provider: self.provider.name().to_string(),
            max_steps: self.control.settings().max_steps,
        });
        tracing::info!(goal = %goal, provider = %self.provider.name(), "run started");

        let mut frame = match self.capture.capture() {
            Ok(f) => f,
            Err(e) => return EndReason::Failed(e.to_string()),
        };
        self.bus.emit(AgentEvent::ScreenshotCaptured {
            step: 0,
            width: frame.width(),
            height: frame.height(),
        });

        let mut prev_frame = frame.clone();
        let mut unchanged_count: u32 = 0;
        let mut step: u32 = 0;

        loop {
            step += 1;

            // Control check before the (potentially long) model call.
            if !self.check_controls().await {
                return EndReason::StoppedByUser;
            }

            // Live settings take effect on the very next iteration.
            let live = self.control.settings();
            if step > live.max_steps {
                tracing::info!(max_steps = live.max_steps, "reached max steps without completion");
                return EndReason::MaxSteps;
            }

            self.bus.emit(AgentEvent::StepStarted {
                step,
                max_steps: live.max_steps,
            });
            tracing::info!(step, max_steps = live.max_steps, "step started");

            let user_text = prompts::build_user_context(goal, &ctx.transcript, unchanged_count);
            if unchanged_count >= STAGNATION_WARNING_AFTER {
                tracing::warn!(unchanged_count, "screen stagnant, warning injected into prompt");
            }

            self.bus.emit(AgentEvent::ModelCallStarted { step });
            let output = match self.call_model(&system_prompt, &user_text, &frame, step).await {
                Ok(o) => o,
                Err(e) => return EndReason::Failed(e.to_string()),
            };
            ctx.llm_calls += 1;
            if let Some(usage) = &output.usage {
                ctx.totals.accumulate(usage);
            }

            let parsed = match self.provider.parse_mode() {
                ParseMode::Tagged => parser::parse_response(&output.text),
                ParseMode::ToolCall => parser::parse_tool_calls(&output.tool_calls),
            };
            let think = parsed
                .think()
                .map(str::to_string)
                .or_else(|| output.reasoning.clone());

            self.bus.emit(AgentEvent::ModelCallFinished {
                step,
                raw: output.text.clone(),
                think: think.clone(),
                usage: output.usage,
            });

            // A stop may have arrived while the model was thinking.
            if !self.check_controls().await {
                return EndReason::StoppedByUser;
            }

            let (width, height) = (frame.width(), frame.height());

            match &parsed {
                ParsedResponse::Sequence { steps, .. } => {
                    tracing::info!(step, actions = steps.len(), "executing action sequence");
                    let total = steps.len();
                    let mut results: Vec<String> = Vec::new();
                    let mut done_reason: Option<String> = None;
                    let mut stopped = false;

                    for (i, sequenced) in steps.iter().enumerate() {
                        if !self.check_controls().await {
                            stopped = true;
                            break;
                        }
                        if let Action::Done { reason } = &sequenced.action {
                            done_reason =
                                Some(reason.clone().unwrap_or_else(|| "task complete".into()));
                            break;
                        }
                        let result = self.executor.execute(&sequenced.action, width, height);
                        tracing::info!(step, index = i + 1, total, result = %result, "sequence action executed");
                        self.bus.emit(AgentEvent::ActionExecuted {
                            step,
                            result: format!("[{}/{}] {}", i + 1, total, result),
                            action: sequenced.action.clone(),
                        });
                        let errored = is_error_result(&result);
                        results.push(result);
                        if errored {
                            tracing::warn!(step, index = i + 1, "sequence aborted on action error");
                            break;
                        }
                        if i < total - 1 {
                            sleep(SEQUENCE_ACTION_GAP).await;
                        }
                    }

                    ctx.transcript
                        .push(format!("Step {step}: sequence [{}]", results.join(", ")));
                    self.push_record(ctx, step, &output, think, parsed.clone(), results);

                    if stopped || self.control.stop_requested() {
                        return EndReason::StoppedByUser;
                    }
                    if let Some(reason) = done_reason {
                        return EndReason::Done(reason);
                    }
                }

                ParsedResponse::Single { action: single } => {
                    if let Action::Done { reason } = &single.action {
                        let reason = reason.clone().unwrap_or_else(|| "task complete".into());
                        self.push_record(
                            ctx,
                            step,
                            &output,
                            think,
                            parsed.clone(),
                            vec!["done".into()],
                        );
                        return EndReason::Done(reason);
                    }

                    if single.action.is_unknown() {
                        // The only step kind that performs no screen action:
                        // record the miss and let the model try again.
                        tracing::warn!(step, "could not parse model response, retrying next step");
                        self.bus.emit(AgentEvent::ActionExecuted {
                            step,
                            result: "ERROR: parse error, retrying".to_string(),
                            action: single.action.clone(),
                        });
                        ctx.transcript
                            .push(format!("Step {step}: [parse error, retrying]"));
                        self.push_record(
                            ctx,
                            step,
                            &output,
                            None,
                            parsed.clone(),
                            vec!["parse error".into()],
                        );
                        continue;
                    }

                    let result = self.executor.execute(&single.action, width, height);
                    tracing::info!(step, result = %result, "action executed");
                    self.bus.emit(AgentEvent::ActionExecuted {
                        step,
                        result: result.clone(),
                        action: single.action.clone(),
                    });
                    let errored = is_error_result(&result);
                    ctx.transcript.push(format!("Step {step}: {result}"));
                    self.push_record(ctx, step, &output, think, parsed.clone(), vec![result]);
                    if errored {
                        // Error stays visible in the transcript; observe and
                        // decide again without waiting for a screen change.
                        continue;
                    }
                }
            }

            self.bus.emit(AgentEvent::StepCompleted { step });

            if self.control.stop_requested() {
                return EndReason::StoppedByUser;
            }

            // Give the UI time to settle, then look again.
            sleep(self.control.settings().step_delay).await;
            frame = match self.capture.capture() {
                Ok(f) => f,
                Err(e) => return EndReason::Failed(e.to_string()),
            };
            self.bus.emit(AgentEvent::ScreenshotCaptured {
                step,
                width: frame.width(),
                height: frame.height(),
            });

            if frames_similar(&prev_frame, &frame) {
                unchanged_count += 1;
                if let Some(last) = ctx.transcript.last_mut() {
                    if !last.ends_with(STAGNANT_MARKER) {
                        last.push_str("  ");
                        last.push_str(STAGNANT_MARKER);
                    }
                }
            } else {
                unchanged_count = 0;
            }
            prev_frame = frame.clone();
        }
    }

    /// One model invocation with bounded backoff on rate limiting.
    async fn call_model(
        &self,
        system_prompt: &str,
        user_text: &str,
        frame: &Frame,
        step: u32,
    ) -> AgentResult<RawModelOutput> {
        let bus = self.bus.clone();
        let on_reasoning = move |delta: &str, accumulated: &str| {
            bus.emit(AgentEvent::ReasoningDelta {
                step,
                delta: delta.to_string(),
                accumulated: accumulated.to_string(),
            });
        };

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .provider
                .call(
                    system_prompt,
                    user_text,
                    frame,
                    &self.call_config,
                    Some(&on_reasoning),
                )
                .await;

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < RATE_LIMIT_RETRIES => {
                    attempt += 1;
                    let wait = Duration::from_secs(1 << attempt);
                    tracing::warn!(
                        attempt,
                        wait_s = wait.as_secs(),
                        error = %e,
                        "rate limited, backing off"
                    );
                    sleep(wait).await;
                    // Reset any partially streamed display before retrying.
                    self.bus.emit(AgentEvent::ReasoningDelta {
                        step,
                        delta: String::new(),
                        accumulated: String::new(),
                    });
                }
                Err(e) if e.is_retryable() => {
                    return Err(AgentError::Provider(format!(
                        "rate limited after {RATE_LIMIT_RETRIES} retries: {e}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Honor stop and pause. Returns false when the run must end.
    async fn check_controls(&self) -> bool {
        if self.control.stop_requested() {
            return false;
        }
        self.control.wait_while_paused().await;
        !self.control.stop_requested()
    }

    fn push_record(
        &mut self,
        ctx: &mut RunContext,
        step: u32,
        output: &RawModelOutput,
        think: Option<String>,
        parsed: ParsedResponse,
        results: Vec<String>,
    ) {
        let record = StepRecord {
            step,
            ts: chrono::Utc::now().timestamp_millis(),
            raw: output.text.clone(),
            think,
            parsed,
            results,
            usage: output.usage,
        };
        self.sink.record(&record);
        ctx.records.push(record);
    }
}
