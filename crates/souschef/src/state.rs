use std::time::Duration;

use serde::Serialize;
use shared::domain::Position;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Complete,
    Stopped,
}

/// Shared cursor of the stepper. Written by the stepper when a substep
/// completes and by navigation/stop calls from other tasks; every write goes
/// through the owning `watch::Sender`, so position and flags change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExecutionState {
    pub position: Position,
    pub phase: Phase,
    pub stop_requested: bool,
    /// Bumped by every navigation call.
    pub generation: u64,
}

impl ExecutionState {
    pub fn engine_state(&self) -> EngineState {
        match self.phase {
            Phase::Idle => EngineState::Idle,
            Phase::Running => EngineState::Running(self.position),
            Phase::Complete => EngineState::Complete,
            Phase::Stopped => EngineState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running(Position),
    Complete,
    Stopped,
}

/// Cuts a wait short when a stop is requested or the cursor is moved by
/// navigation after the wait's owner read it.
pub struct Interrupt {
    rx: watch::Receiver<ExecutionState>,
    generation: u64,
}

impl Interrupt {
    pub fn new(rx: watch::Receiver<ExecutionState>, generation: u64) -> Self {
        Self { rx, generation }
    }

    pub fn is_raised(&self) -> bool {
        let state = self.rx.borrow();
        state.stop_requested || state.generation != self.generation
    }

    /// Resolves once a stop is requested. Navigation does not wake it.
    pub async fn stop_requested(&mut self) {
        let _ = self.rx.wait_for(|state| state.stop_requested).await;
    }

    /// Returns `true` if the full `duration` elapsed, `false` if interrupted.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_raised() {
            return false;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.rx.changed() => {
                    if changed.is_err() || self.is_raised() {
                        return false;
                    }
                }
            }
        }
    }
}
