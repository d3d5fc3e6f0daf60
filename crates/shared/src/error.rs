use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{Position, StepId};

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to read recipe file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML recipe: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON recipe: {0}")]
    Json(#[from] serde_json::Error),
    #[error("recipe defines no steps")]
    Empty,
    #[error("recipe must start at step 1")]
    MissingFirstStep,
    #[error("step key '{0}' is not a positive integer")]
    InvalidStepKey(String),
    #[error("substep key '{key}' in step {step} is not a positive integer")]
    InvalidSubstepKey { step: StepId, key: String },
    #[error("step {0} is defined more than once")]
    DuplicateStep(StepId),
    #[error("substep {0} is defined more than once")]
    DuplicateSubstep(Position),
    #[error("step {0} defines no substeps")]
    EmptyStep(StepId),
    #[error("step {0} must start at substep 1")]
    MissingFirstSubstep(StepId),
    #[error("unknown action '{action}' at {position}")]
    UnknownAction { position: Position, action: String },
    #[error("action '{action}' at {position} requires argument '{argument}'")]
    MissingArgument {
        position: Position,
        action: String,
        argument: &'static str,
    },
    #[error("action '{action}' at {position} does not accept argument '{argument}'")]
    UnexpectedArgument {
        position: Position,
        action: String,
        argument: String,
    },
    #[error("argument '{argument}' at {position} must be {expected}")]
    InvalidArgument {
        position: Position,
        argument: &'static str,
        expected: &'static str,
    },
}
