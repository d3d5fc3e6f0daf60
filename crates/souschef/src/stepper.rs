use std::{sync::Arc, time::Duration};

use shared::{domain::Position, recipe::RecipeDefinition};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    dispatcher::ActionDispatcher,
    display::{DisplayCache, DisplayState},
    state::{EngineState, ExecutionState, Interrupt, Phase},
};

/// Evaluates the substep under the cursor once per tick and moves the
/// cursor forward when it completes.
pub(crate) struct Stepper {
    pub(crate) recipe: Arc<RecipeDefinition>,
    pub(crate) dispatcher: ActionDispatcher,
    pub(crate) display: DisplayCache,
    pub(crate) state: Arc<watch::Sender<ExecutionState>>,
    pub(crate) tick: Duration,
}

impl Stepper {
    pub(crate) async fn run(self) -> EngineState {
        let mut announced: Option<Position> = None;

        let outcome = loop {
            let current = *self.state.borrow();
            if current.stop_requested {
                break Phase::Stopped;
            }
            if current.phase == Phase::Complete {
                break Phase::Complete;
            }

            let position = current.position;
            if announced != Some(position) {
                info!(
                    step = position.step.0,
                    substep = position.substep.0,
                    "step {} | substep {}",
                    position.step,
                    position.substep
                );
                announced = Some(position);
            }

            self.display.refresh(&self.recipe, position);

            let mut interrupt = Interrupt::new(self.state.subscribe(), current.generation);
            let Some(substep) = self.recipe.substep(position) else {
                warn!(%position, "no substep defined here, waiting for navigation");
                interrupt.sleep(self.tick).await;
                continue;
            };
            if interrupt.is_raised() {
                continue;
            }

            if self
                .dispatcher
                .execute(&substep.action, &mut interrupt)
                .await
            {
                self.advance(position, current.generation);
            } else {
                interrupt.sleep(self.tick).await;
            }
        };

        self.finish(outcome)
    }

    // Drops the result if the cursor was navigated away or a stop arrived
    // while the action was running.
    fn advance(&self, from: Position, generation: u64) {
        let recipe = &self.recipe;
        self.state.send_if_modified(|state| {
            if state.stop_requested
                || state.phase != Phase::Running
                || state.generation != generation
                || state.position != from
            {
                return false;
            }

            match recipe.next_position(from) {
                Some(next) => state.position = next,
                None => state.phase = Phase::Complete,
            }
            true
        });
    }

    fn finish(&self, outcome: Phase) -> EngineState {
        self.state.send_modify(|state| state.phase = outcome);

        if outcome == Phase::Complete {
            self.display.publish(DisplayState::complete(&self.recipe));
            info!("recipe complete");
        } else {
            info!(position = %self.state.borrow().position, "stepper stopped");
        }

        self.state.borrow().engine_state()
    }
}

#[cfg(test)]
#[path = "tests/stepper_tests.rs"]
mod tests;
