//! Action execution boundary.
//!
//! The engine drives any [`ActionExecutor`]; results are plain strings so
//! they can go straight into the transcript the model sees next step. A
//! result starting with `ERROR` marks a non-fatal failure of that one
//! action and the run continues.

pub mod input;

pub use input::EnigoExecutor;

use crate::action::Action;

/// Marker prefix for non-fatal per-action failures.
pub const ERROR_PREFIX: &str = "ERROR";

/// Executes one action against a screen of the given physical size and
/// describes what happened. Blocking is acceptable; the engine runs on its
/// own worker and cancellation is cooperative between actions.
pub trait ActionExecutor: Send {
    fn execute(&mut self, action: &Action, width: u32, height: u32) -> String;
}

pub fn is_error_result(result: &str) -> bool {
    result.starts_with(ERROR_PREFIX)
}
