//! Error types for Neuromesh

use crate::intention::IntentionStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid transition: intention {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: Uuid,
        actual: IntentionStatus,
        expected: IntentionStatus,
    },

    #[error("unknown intention: {0}")]
    UnknownIntention(String),

    #[error("ambiguous intention prefix '{prefix}': {matches} matches")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error("unknown unit: {0}")]
    UnknownNeuron(String),

    #[error("duplicate unit id: {0}")]
    DuplicateNeuron(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_transition(id: Uuid, actual: IntentionStatus, expected: IntentionStatus) -> Self {
        Self::InvalidTransition {
            id,
            actual,
            expected,
        }
    }

    pub fn unknown_intention(id: impl Into<String>) -> Self {
        Self::UnknownIntention(id.into())
    }

    pub fn unknown_neuron(id: impl Into<String>) -> Self {
        Self::UnknownNeuron(id.into())
    }

    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage(reason.into())
    }

    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution(reason.into())
    }
}
