use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::{domain::Position, recipe::RecipeDefinition};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, info};

pub mod control_plane;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod state;
mod stepper;
pub mod telemetry;
#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use control_plane::{ControlPlane, HttpControlPlane};
pub use display::DisplayState;
pub use error::EngineError;
pub use state::{EngineState, ExecutionState, Phase};
pub use telemetry::TelemetryCache;

use dispatcher::ActionDispatcher;
use display::DisplayCache;
use stepper::Stepper;
use telemetry::TelemetryPoller;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const DEFAULT_SETTLE_FACTOR: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of both the telemetry poll and the substep re-evaluation.
    pub tick: Duration,
    /// A positive classification settles for `interval * settle_factor`.
    pub settle_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            settle_factor: DEFAULT_SETTLE_FACTOR,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    Next,
    Previous,
}

struct EngineTasks {
    stepper: JoinHandle<EngineState>,
    poller: JoinHandle<()>,
}

/// Drives a recipe against a remote control service.
///
/// [`SousChef::run`] spawns the telemetry poller and the stepper onto the
/// current Tokio runtime and returns straight away. [`SousChef::stop`] waits
/// for both to exit. Navigation may be called from any task while running.
pub struct SousChef {
    recipe: Arc<RecipeDefinition>,
    config: EngineConfig,
    control: Arc<dyn ControlPlane>,
    telemetry: TelemetryCache,
    display: DisplayCache,
    state: Arc<watch::Sender<ExecutionState>>,
    shutdown: watch::Sender<bool>,
    /// Final state, published once the tasks have been joined.
    stopped: watch::Sender<Option<EngineState>>,
    tasks: Mutex<Option<EngineTasks>>,
}

impl SousChef {
    pub fn new(
        recipe: impl Into<Arc<RecipeDefinition>>,
        control: Arc<dyn ControlPlane>,
        config: EngineConfig,
    ) -> Self {
        let recipe = recipe.into();
        let initial = ExecutionState {
            position: recipe.start(),
            ..ExecutionState::default()
        };
        let (state, _) = watch::channel(initial);
        let (shutdown, _) = watch::channel(false);
        let (stopped, _) = watch::channel(None);
        let display = DisplayCache::new(DisplayState::derive(&recipe, initial.position));

        Self {
            recipe,
            config,
            control,
            telemetry: TelemetryCache::new(),
            display,
            state: Arc::new(state),
            shutdown,
            stopped,
            tasks: Mutex::new(None),
        }
    }

    /// Starts polling and stepping. Only the first call starts anything.
    pub fn run(&self) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut tasks = self.lock_tasks();

        let start = self.recipe.start();
        let started = self.state.send_if_modified(|state| {
            if state.phase != Phase::Idle {
                return false;
            }
            state.phase = Phase::Running;
            state.position = start;
            true
        });
        if !started {
            return Err(EngineError::AlreadyStarted);
        }

        let poller = TelemetryPoller::new(
            Arc::clone(&self.control),
            self.telemetry.clone(),
            self.config.tick,
        );
        let stepper = Stepper {
            recipe: Arc::clone(&self.recipe),
            dispatcher: ActionDispatcher::new(
                Arc::clone(&self.control),
                self.telemetry.clone(),
                self.config.settle_factor,
            ),
            display: self.display.clone(),
            state: Arc::clone(&self.state),
            tick: self.config.tick,
        };

        *tasks = Some(EngineTasks {
            poller: runtime.spawn(poller.run(self.shutdown.subscribe())),
            stepper: runtime.spawn(stepper.run()),
        });
        info!(
            steps = self.recipe.steps().count(),
            tick_ms = self.config.tick.as_millis() as u64,
            "souschef started"
        );
        Ok(())
    }

    /// Requests a stop and waits for the stepper and the poller to exit.
    /// Concurrent callers all wait for the same exit. Before `run` this is a
    /// no-op returning the current state.
    pub async fn stop(&self) -> Result<EngineState, EngineError> {
        let mut stopped = self.stopped.subscribe();
        let tasks = self.lock_tasks().take();
        let Some(tasks) = tasks else {
            if self.state.borrow().phase == Phase::Idle {
                debug!("stop called before run");
                return Ok(self.state());
            }
            debug!("stop already in progress, waiting for tasks to exit");
            let final_state = stopped
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|state| *state);
            return Ok(final_state.unwrap_or_else(|| self.state()));
        };

        info!("stop called");
        let _publish = PublishStopped {
            stopped: &self.stopped,
            state: &self.state,
        };
        self.state.send_modify(|state| state.stop_requested = true);
        self.shutdown.send_replace(true);

        let final_state = tasks
            .stepper
            .await
            .map_err(|source| EngineError::TaskFailed {
                task: "stepper",
                source,
            })?;
        tasks
            .poller
            .await
            .map_err(|source| EngineError::TaskFailed {
                task: "telemetry poller",
                source,
            })?;

        info!(state = ?final_state, "souschef stopped");
        Ok(final_state)
    }

    /// Jumps to substep 1 of the next step, completing the recipe when there
    /// is no next step. Ignored unless running.
    pub fn next(&self) -> bool {
        info!("next called");
        self.navigate(Direction::Next)
    }

    /// Jumps to substep 1 of the previous step. With no previous step the
    /// current step restarts. Ignored unless running.
    pub fn previous(&self) -> bool {
        info!("previous called");
        self.navigate(Direction::Previous)
    }

    fn navigate(&self, direction: Direction) -> bool {
        let recipe = &self.recipe;
        let moved = self.state.send_if_modified(|state| {
            if state.phase != Phase::Running || state.stop_requested {
                return false;
            }

            let current = state.position.step;
            match direction {
                Direction::Next => {
                    let target = current.next();
                    if recipe.contains_step(target) {
                        state.position = Position::start_of(target);
                    } else {
                        state.phase = Phase::Complete;
                    }
                }
                Direction::Previous => {
                    let target = current
                        .prev()
                        .filter(|step| recipe.contains_step(*step))
                        .unwrap_or(current);
                    state.position = Position::start_of(target);
                }
            }
            state.generation = state.generation.wrapping_add(1);
            true
        });

        if !moved {
            debug!(?direction, "navigation ignored, engine is not running");
        }
        moved
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().engine_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    pub fn recipe(&self) -> &RecipeDefinition {
        &self.recipe
    }

    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }

    pub fn display(&self) -> DisplayState {
        self.display.current()
    }

    pub fn subscribe_display(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    pub fn previous_message(&self) -> String {
        self.display.current().previous_message
    }

    pub fn current_message(&self) -> String {
        self.display.current().current_message
    }

    pub fn next_message(&self) -> String {
        self.display.current().next_message
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Option<EngineTasks>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Wakes callers waiting in `stop` however the joining caller leaves,
// including when its future is dropped mid-join.
struct PublishStopped<'a> {
    stopped: &'a watch::Sender<Option<EngineState>>,
    state: &'a watch::Sender<ExecutionState>,
}

impl Drop for PublishStopped<'_> {
    fn drop(&mut self) {
        let final_state = self.state.borrow().engine_state();
        self.stopped.send_replace(Some(final_state));
    }
}

impl Drop for SousChef {
    // Background tasks are not joined here; they observe the flags and exit.
    fn drop(&mut self) {
        self.state.send_modify(|state| state.stop_requested = true);
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
