//! Step-lifecycle broadcast: any number of observers, zero obligation on the
//! engine. Fan-out is fire-and-forget per subscriber so a slow consumer can
//! never stall a step.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::action::Action;
use crate::llm::provider::TokenUsage;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        goal: String,
        provider: String,
        max_steps: u32,
    },
    StepStarted {
        step: u32,
        max_steps: u32,
    },
    ScreenshotCaptured {
        step: u32,
        width: u32,
        height: u32,
    },
    ModelCallStarted {
        step: u32,
    },
    /// Incremental reasoning text from a streaming model call. An empty
    /// delta with an empty accumulated string is a reset: observers should
    /// clear any partial display (emitted before a rate-limit retry).
    ReasoningDelta {
        step: u32,
        delta: String,
        accumulated: String,
    },
    ModelCallFinished {
        step: u32,
        raw: String,
        think: Option<String>,
        usage: Option<TokenUsage>,
    },
    ActionExecuted {
        step: u32,
        result: String,
        action: Action,
    },
    StepCompleted {
        step: u32,
    },
    RunFinished {
        reason: String,
        detail: Option<String>,
    },
    RunError {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    StepStarted,
    ScreenshotCaptured,
    ModelCallStarted,
    ReasoningDelta,
    ModelCallFinished,
    ActionExecuted,
    StepCompleted,
    RunFinished,
    RunError,
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::RunStarted { .. } => EventKind::RunStarted,
            AgentEvent::StepStarted { .. } => EventKind::StepStarted,
            AgentEvent::ScreenshotCaptured { .. } => EventKind::ScreenshotCaptured,
            AgentEvent::ModelCallStarted { .. } => EventKind::ModelCallStarted,
            AgentEvent::ReasoningDelta { .. } => EventKind::ReasoningDelta,
            AgentEvent::ModelCallFinished { .. } => EventKind::ModelCallFinished,
            AgentEvent::ActionExecuted { .. } => EventKind::ActionExecuted,
            AgentEvent::StepCompleted { .. } => EventKind::StepCompleted,
            AgentEvent::RunFinished { .. } => EventKind::RunFinished,
            AgentEvent::RunError { .. } => EventKind::RunError,
        }
    }
}

struct Subscriber {
    filter: Option<EventKind>,
    tx: mpsc::UnboundedSender<AgentEvent>,
}

/// Cloneable handle to the event fan-out. Subscribers that drop their
/// receiver are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AgentEvent> {
        self.subscribe_filtered(None)
    }

    /// Receive only events of one kind.
    pub fn subscribe_to(&self, kind: EventKind) -> mpsc::UnboundedReceiver<AgentEvent> {
        self.subscribe_filtered(Some(kind))
    }

    fn subscribe_filtered(&self, filter: Option<EventKind>) -> mpsc::UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Subscriber { filter, tx });
        }
        rx
    }

    /// Deliver an event to every matching subscriber. Never blocks.
    pub fn emit(&self, event: AgentEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        let kind = event.kind();
        subs.retain(|s| {
            if s.filter.is_none() || s.filter == Some(kind) {
                s.tx.send(event.clone()).is_ok()
            } else {
                !s.tx.is_closed()
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::StepStarted {
            step: 1,
            max_steps: 30,
        });
        bus.emit(AgentEvent::StepCompleted { step: 1 });
        assert_eq!(rx.recv().await.map(|e| e.kind()), Some(EventKind::StepStarted));
        assert_eq!(
            rx.recv().await.map(|e| e.kind()),
            Some(EventKind::StepCompleted)
        );
    }

    #[tokio::test]
    async fn filtered_subscriber_sees_only_its_kind() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_to(EventKind::StepCompleted);
        bus.emit(AgentEvent::StepStarted {
            step: 1,
            max_steps: 30,
        });
        bus.emit(AgentEvent::StepCompleted { step: 1 });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::StepCompleted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_break_emission() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        bus.emit(AgentEvent::StepCompleted { step: 1 });
        let mut live = bus.subscribe();
        bus.emit(AgentEvent::StepCompleted { step: 2 });
        assert!(matches!(
            live.recv().await,
            Some(AgentEvent::StepCompleted { step: 2 })
        ));
    }
}
