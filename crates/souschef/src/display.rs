use std::sync::Arc;

use serde::Serialize;
use shared::{domain::Position, recipe::RecipeDefinition};
use tokio::sync::watch;

pub const CONNECTED_MESSAGE: &str = "Onionbot is connected";
pub const COMPLETE_MESSAGE: &str = "Recipe complete!";
pub const MISSING_MESSAGE: &str = "No instruction for this step";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub previous_message: String,
    pub current_message: String,
    pub next_message: String,
}

impl DisplayState {
    /// Messages around `position` in execution order. Neighbours that do not
    /// exist fall back to the connected/complete placeholders.
    ///
    /// Neighbours cross step boundaries on purpose, so the last substep of a
    /// step already shows the first instruction of the next one.
    pub fn derive(recipe: &RecipeDefinition, position: Position) -> Self {
        let message_at = |position: Option<Position>, fallback: &str| {
            position
                .and_then(|position| recipe.message(position))
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            previous_message: message_at(recipe.previous_position(position), CONNECTED_MESSAGE),
            current_message: message_at(Some(position), MISSING_MESSAGE),
            next_message: message_at(recipe.next_position(position), COMPLETE_MESSAGE),
        }
    }

    pub fn complete(recipe: &RecipeDefinition) -> Self {
        let previous_message = recipe
            .walk()
            .last()
            .map(|(_, substep)| substep.message.clone())
            .unwrap_or_else(|| CONNECTED_MESSAGE.to_string());

        Self {
            previous_message,
            current_message: COMPLETE_MESSAGE.to_string(),
            next_message: COMPLETE_MESSAGE.to_string(),
        }
    }
}

/// Latest display text, published to any number of UI subscribers.
#[derive(Clone)]
pub struct DisplayCache {
    tx: Arc<watch::Sender<DisplayState>>,
}

impl DisplayCache {
    pub fn new(initial: DisplayState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribers are only woken when the text actually changes.
    pub fn publish(&self, state: DisplayState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        })
    }

    pub fn refresh(&self, recipe: &RecipeDefinition, position: Position) -> bool {
        self.publish(DisplayState::derive(recipe, position))
    }

    pub fn current(&self) -> DisplayState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/display_tests.rs"]
mod tests;
