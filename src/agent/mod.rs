//! Run orchestration: the step engine plus its control, event, and history
//! surfaces.

pub mod control;
pub mod engine;
pub mod events;
pub mod history;

pub use control::{ControlHandle, LiveSettings, RunState};
pub use engine::{EndReason, RunOutcome, StepEngine, STAGNANT_MARKER};
pub use events::{AgentEvent, EventBus, EventKind};
pub use history::{HistorySink, JsonlHistorySink, NullSink, StepRecord};
