//! Combat error taxonomy
//!
//! Every variant except `Internal` is a clean rejection: the encounter is
//! validated before it is mutated, so a rejected request leaves no trace.

use thiserror::Error;

use super::dice::DiceError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("not your turn: {actor} tried to act during {current}'s turn")]
    NotYourTurn { actor: String, current: String },

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("no active encounter")]
    NoActiveEncounter,

    #[error("reaction already used this round by {0}")]
    ReactionAlreadyUsed(String),

    #[error("{0}")]
    InvalidPrecondition(String),

    #[error("bad dice expression: {0}")]
    Dice(#[from] DiceError),

    #[error("internal combat fault: {0}")]
    Internal(String),
}

impl CombatError {
    /// Stable machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            CombatError::NotYourTurn { .. } => "not_your_turn",
            CombatError::TargetNotFound(_) => "target_not_found",
            CombatError::NoActiveEncounter => "no_active_encounter",
            CombatError::ReactionAlreadyUsed(_) => "reaction_already_used",
            CombatError::InvalidPrecondition(_) => "invalid_precondition",
            CombatError::Dice(_) => "invalid_dice",
            CombatError::Internal(_) => "internal",
        }
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        CombatError::InvalidPrecondition(msg.into())
    }
}
