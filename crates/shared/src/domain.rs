use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            pub const FIRST: Self = Self(1);

            pub fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            /// `None` when already at the first identifier.
            pub fn prev(self) -> Option<Self> {
                self.0.checked_sub(1).filter(|id| *id > 0).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(StepId);
id_newtype!(SubstepId);

/// A `(step, substep)` pair. Ordered step-major, substep-minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub step: StepId,
    pub substep: SubstepId,
}

impl Position {
    pub fn new(step: u32, substep: u32) -> Self {
        Self {
            step: StepId(step),
            substep: SubstepId(substep),
        }
    }

    pub fn start_of(step: StepId) -> Self {
        Self {
            step,
            substep: SubstepId::FIRST,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start_of(StepId::FIRST)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.substep)
    }
}
