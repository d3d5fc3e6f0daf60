use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    domain::{Position, StepId, SubstepId},
    error::RecipeError,
};

/// What a substep does each time it is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Completes once the remote classifier reports `label` for `model` and
    /// the reading has settled.
    Classify { model: String, label: String },
    SetClassifiers { value: String },
    SetFixedSetpoint { value: String },
    SetTemperatureTarget { value: String },
    SetHobOff,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classify { .. } => "classify",
            Self::SetClassifiers { .. } => "set_classifiers",
            Self::SetFixedSetpoint { .. } => "set_fixed_setpoint",
            Self::SetTemperatureTarget { .. } => "set_temperature_target",
            Self::SetHobOff => "set_hob_off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substep {
    pub action: Action,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    substeps: BTreeMap<SubstepId, Substep>,
}

impl Step {
    pub fn substep(&self, id: SubstepId) -> Option<&Substep> {
        self.substeps.get(&id)
    }

    pub fn substeps(&self) -> impl Iterator<Item = (SubstepId, &Substep)> {
        self.substeps.iter().map(|(id, substep)| (*id, substep))
    }

    /// Last substep reached by counting up from substep 1 without gaps.
    pub fn last_reachable_substep(&self) -> Option<SubstepId> {
        let mut current = self.substep(SubstepId::FIRST).map(|_| SubstepId::FIRST)?;
        while self.substeps.contains_key(&current.next()) {
            current = current.next();
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.substeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substeps.is_empty()
    }
}

/// A validated recipe. Never mutated once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDefinition {
    steps: BTreeMap<StepId, Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubstep {
    action: String,
    message: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

type RawRecipe = BTreeMap<String, BTreeMap<String, RawSubstep>>;

impl RecipeDefinition {
    pub fn from_toml_str(raw: &str) -> Result<Self, RecipeError> {
        let parsed: RawRecipe = toml::from_str(raw)?;
        Self::from_raw(parsed)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RecipeError> {
        let parsed: RawRecipe = serde_json::from_str(raw)?;
        Self::from_raw(parsed)
    }

    /// Loads a recipe file; `.json` files are read as JSON, anything else as
    /// TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecipeError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    fn from_raw(raw: RawRecipe) -> Result<Self, RecipeError> {
        let mut steps = BTreeMap::new();
        for (step_key, raw_substeps) in raw {
            let step_id = parse_key(&step_key)
                .map(StepId)
                .ok_or_else(|| RecipeError::InvalidStepKey(step_key.clone()))?;

            let mut substeps = BTreeMap::new();
            for (substep_key, raw_substep) in raw_substeps {
                let substep_id = parse_key(&substep_key).map(SubstepId).ok_or_else(|| {
                    RecipeError::InvalidSubstepKey {
                        step: step_id,
                        key: substep_key.clone(),
                    }
                })?;
                let position = Position {
                    step: step_id,
                    substep: substep_id,
                };
                let substep = build_substep(position, raw_substep)?;
                if substeps.insert(substep_id, substep).is_some() {
                    return Err(RecipeError::DuplicateSubstep(position));
                }
            }

            if substeps.is_empty() {
                return Err(RecipeError::EmptyStep(step_id));
            }
            if !substeps.contains_key(&SubstepId::FIRST) {
                return Err(RecipeError::MissingFirstSubstep(step_id));
            }
            if steps.insert(step_id, Step { substeps }).is_some() {
                return Err(RecipeError::DuplicateStep(step_id));
            }
        }

        if steps.is_empty() {
            return Err(RecipeError::Empty);
        }
        if !steps.contains_key(&StepId::FIRST) {
            return Err(RecipeError::MissingFirstStep);
        }

        Ok(Self { steps })
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    pub fn contains_step(&self, id: StepId) -> bool {
        self.steps.contains_key(&id)
    }

    pub fn substep(&self, position: Position) -> Option<&Substep> {
        self.step(position.step)?.substep(position.substep)
    }

    pub fn message(&self, position: Position) -> Option<&str> {
        self.substep(position).map(|substep| substep.message.as_str())
    }

    pub fn steps(&self) -> impl Iterator<Item = (StepId, &Step)> {
        self.steps.iter().map(|(id, step)| (*id, step))
    }

    pub fn start(&self) -> Position {
        Position::default()
    }

    /// Where execution goes after `position` completes: the next substep of
    /// the same step, else substep 1 of the next step. `None` once the
    /// recipe is exhausted.
    pub fn next_position(&self, position: Position) -> Option<Position> {
        let step = self.step(position.step)?;
        let next_substep = position.substep.next();
        if step.substep(next_substep).is_some() {
            return Some(Position {
                step: position.step,
                substep: next_substep,
            });
        }

        let next_step = position.step.next();
        self.contains_step(next_step).then(|| Position::start_of(next_step))
    }

    /// Inverse of [`Self::next_position`]: the previous substep, else the
    /// last substep of the previous step.
    pub fn previous_position(&self, position: Position) -> Option<Position> {
        if let Some(substep) = position.substep.prev() {
            if self.substep(Position { substep, ..position }).is_some() {
                return Some(Position { substep, ..position });
            }
        }

        let step = position.step.prev()?;
        let substep = self.step(step)?.last_reachable_substep()?;
        Some(Position { step, substep })
    }

    /// Every position reachable from the start, in execution order.
    pub fn walk(&self) -> impl Iterator<Item = (Position, &Substep)> {
        let mut cursor = self.substep(self.start()).map(|_| self.start());
        std::iter::from_fn(move || {
            let position = cursor?;
            cursor = self.next_position(position);
            self.substep(position).map(|substep| (position, substep))
        })
    }
}

fn parse_key(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|id| *id > 0)
}

fn build_substep(position: Position, raw: RawSubstep) -> Result<Substep, RecipeError> {
    let mut args = ArgReader {
        position,
        action: raw.action,
        args: raw.args.unwrap_or_default(),
    };

    let action = match args.action.as_str() {
        "classify" => Action::Classify {
            model: args.take_string("model")?,
            label: args.take_string("label")?,
        },
        "set_classifiers" => Action::SetClassifiers {
            value: args.take_scalar("value")?,
        },
        "set_fixed_setpoint" => Action::SetFixedSetpoint {
            value: args.take_scalar("value")?,
        },
        "set_temperature_target" => Action::SetTemperatureTarget {
            value: args.take_scalar("value")?,
        },
        "set_hob_off" => Action::SetHobOff,
        _ => {
            return Err(RecipeError::UnknownAction {
                position,
                action: args.action,
            })
        }
    };
    args.finish()?;

    Ok(Substep {
        action,
        message: raw.message,
    })
}

struct ArgReader {
    position: Position,
    action: String,
    args: Map<String, Value>,
}

impl ArgReader {
    fn take(&mut self, name: &'static str) -> Result<Value, RecipeError> {
        self.args
            .remove(name)
            .ok_or_else(|| RecipeError::MissingArgument {
                position: self.position,
                action: self.action.clone(),
                argument: name,
            })
    }

    fn take_string(&mut self, name: &'static str) -> Result<String, RecipeError> {
        match self.take(name)? {
            Value::String(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(RecipeError::InvalidArgument {
                position: self.position,
                argument: name,
                expected: "a non-empty string",
            }),
        }
    }

    fn take_scalar(&mut self, name: &'static str) -> Result<String, RecipeError> {
        match self.take(name)? {
            Value::String(value) => Ok(value),
            Value::Number(value) => Ok(value.to_string()),
            Value::Bool(value) => Ok(value.to_string()),
            _ => Err(RecipeError::InvalidArgument {
                position: self.position,
                argument: name,
                expected: "a string, number or boolean",
            }),
        }
    }

    fn finish(self) -> Result<(), RecipeError> {
        match self.args.into_iter().next() {
            Some((argument, _)) => Err(RecipeError::UnexpectedArgument {
                position: self.position,
                action: self.action,
                argument,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "tests/recipe_tests.rs"]
mod tests;
