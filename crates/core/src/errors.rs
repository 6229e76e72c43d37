use thiserror::Error;

use crate::flows::LifecycleTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    LifecycleTransition(#[from] LifecycleTransitionError),
    #[error("interview must contain at least one prompt")]
    EmptyInterview,
    #[error("interview expects {expected} answers but received {received}")]
    IncompleteAnswers { expected: usize, received: usize },
    #[error("invalid ticket panel: {0}")]
    InvalidPanel(String),
}

/// Failure classes surfaced at the action-router boundary. Every variant maps
/// to a user-visible reply; none of them terminate the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no reply received for interview step {step}")]
    Timeout { step: usize },
    #[error("an interview is already in progress for this user")]
    AlreadyActive,
    #[error("ticket provisioning failed: {0}")]
    Provisioning(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("profile lookup failed: {0}")]
    ExternalLookup(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl TicketError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Timeout { .. } => "timeout",
            Self::AlreadyActive => "already_active",
            Self::Provisioning(_) => "provisioning",
            Self::Authorization(_) => "authorization",
            Self::ExternalLookup(_) => "external_lookup",
            Self::Internal(_) => "internal",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(detail) => format!("The ticket setup is invalid: {detail}."),
            Self::Timeout { .. } => {
                "You did not respond in time. Press Apply again to restart your application."
                    .to_owned()
            }
            Self::AlreadyActive => {
                "You already have an application in progress. Finish it or wait for it to time out before applying again."
                    .to_owned()
            }
            Self::Provisioning(_) | Self::Internal(_) => {
                "Something went wrong while handling your ticket. Please try again later."
                    .to_owned()
            }
            Self::Authorization(detail) => detail.clone(),
            Self::ExternalLookup(_) => "Could not fetch player data.".to_owned(),
        }
    }
}

impl From<DomainError> for TicketError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidPanel(message) => Self::Validation(message),
            DomainError::EmptyInterview
            | DomainError::IncompleteAnswers { .. }
            | DomainError::LifecycleTransition(_) => Self::Internal(value.to_string()),
        }
    }
}
