use crate::auth::Intent;
use crate::types::{Actor, CaseStatus, ProposalStatus};

#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    #[error("{intent} on {id} denied for caller {actor}")]
    Permission {
        intent: Intent,
        id: String,
        actor: String,
    },

    #[error("{intent} on {id} requires status {required}, current status is {current}")]
    InvalidState {
        intent: Intent,
        id: String,
        current: &'static str,
        required: &'static str,
    },

    #[error("duplicate {entity} for {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    // the only retry-eligible failure; everything above is deterministic
    #[error("storage layer failure: {0}")]
    Infrastructure(anyhow::Error),
}

impl BrokerError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn denied(intent: Intent, id: &str, actor: &Actor) -> Self {
        Self::Permission {
            intent,
            id: id.to_string(),
            actor: actor.id.clone(),
        }
    }

    pub fn invalid_proposal_state(
        intent: Intent,
        id: &str,
        current: ProposalStatus,
        required: &'static str,
    ) -> Self {
        Self::InvalidState {
            intent,
            id: id.to_string(),
            current: current.as_str(),
            required,
        }
    }

    pub fn invalid_case_state(
        intent: Intent,
        id: &str,
        current: CaseStatus,
        required: &'static str,
    ) -> Self {
        Self::InvalidState {
            intent,
            id: id.to_string(),
            current: current.as_str(),
            required,
        }
    }

    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<sled::Error> for BrokerError {
    fn from(err: sled::Error) -> Self {
        Self::Infrastructure(anyhow::Error::new(err))
    }
}
