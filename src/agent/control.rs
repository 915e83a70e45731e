//! Cooperative run control shared between the engine worker and any number
//! of observer threads: a pause gate, a one-way stop latch, and the two
//! live-adjustable settings.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopping,
}

/// Settings the engine re-reads at the top of every iteration. Everything
/// else in the run configuration is fixed at start.
#[derive(Debug, Clone, Copy)]
pub struct LiveSettings {
    pub max_steps: u32,
    pub step_delay: Duration,
}

struct Inner {
    state: watch::Sender<RunState>,
    settings: RwLock<LiveSettings>,
}

/// Shared control surface for one run. Cheap to clone; all clones observe
/// the same state.
#[derive(Clone)]
pub struct ControlHandle {
    inner: Arc<Inner>,
}

impl ControlHandle {
    pub fn new(settings: LiveSettings) -> Self {
        let (state, _) = watch::channel(RunState::Running);
        Self {
            inner: Arc::new(Inner {
                state,
                settings: RwLock::new(settings),
            }),
        }
    }

    pub fn pause(&self) {
        self.inner.state.send_modify(|s| {
            if *s == RunState::Running {
                *s = RunState::Paused;
            }
        });
    }

    pub fn resume(&self) {
        self.inner.state.send_modify(|s| {
            if *s == RunState::Paused {
                *s = RunState::Running;
            }
        });
    }

    /// One-way: once requested, the run stays stopping. Also releases a
    /// pending pause block so a paused run can still be stopped.
    pub fn stop(&self) {
        self.inner.state.send_modify(|s| *s = RunState::Stopping);
    }

    pub fn stop_requested(&self) -> bool {
        *self.inner.state.borrow() == RunState::Stopping
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.state.borrow() == RunState::Paused
    }

    /// Block (without polling) while paused. Returns on resume or stop.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| *s != RunState::Paused).await;
    }

    pub fn settings(&self) -> LiveSettings {
        match self.inner.settings.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_max_steps(&self, max_steps: u32) {
        self.write_settings(|s| s.max_steps = max_steps);
    }

    pub fn set_step_delay(&self, step_delay: Duration) {
        self.write_settings(|s| s.step_delay = step_delay);
    }

    fn write_settings(&self, f: impl FnOnce(&mut LiveSettings)) {
        match self.inner.settings.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
