use thiserror::Error;

use crate::flows::states::{
    LifecycleAction, LifecycleContext, LifecycleEvent, SessionState, TransitionOutcome,
};

/// Transition table for a ticket session. Only `AwaitingAnswers` has
/// outgoing edges; `Completed` and `Abandoned` are terminal until the
/// registry discards the session.
#[derive(Clone, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn initial_state(&self) -> SessionState {
        SessionState::AwaitingAnswers
    }

    pub fn apply(
        &self,
        current: SessionState,
        event: &LifecycleEvent,
        context: &LifecycleContext,
    ) -> Result<TransitionOutcome, LifecycleTransitionError> {
        use LifecycleAction::{
            NotifyRequesterFailure, NotifyRequesterTimeout, RecordTicketChannel,
            ReleaseInterviewSlot,
        };
        use SessionState::{Abandoned, AwaitingAnswers, Completed};

        let (to, actions) = match (current, event) {
            (AwaitingAnswers, LifecycleEvent::AnswersCollected) => {
                if context.received_answers != context.expected_answers {
                    return Err(LifecycleTransitionError::MissingAnswers {
                        expected: context.expected_answers,
                        received: context.received_answers,
                    });
                }
                if !context.ticket_channel_assigned {
                    return Err(LifecycleTransitionError::MissingTicketChannel);
                }
                (Completed, vec![RecordTicketChannel])
            }
            (AwaitingAnswers, LifecycleEvent::StepTimedOut { .. }) => {
                (Abandoned, vec![NotifyRequesterTimeout, ReleaseInterviewSlot])
            }
            (AwaitingAnswers, LifecycleEvent::ProvisioningFailed) => {
                (Abandoned, vec![NotifyRequesterFailure, ReleaseInterviewSlot])
            }
            (AwaitingAnswers, LifecycleEvent::Cancelled) => (Abandoned, vec![ReleaseInterviewSlot]),
            _ => {
                return Err(LifecycleTransitionError::InvalidTransition {
                    state: current,
                    event: event.clone(),
                });
            }
        };

        Ok(TransitionOutcome { from: current, to, event: event.clone(), actions })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleTransitionError {
    #[error("session cannot complete with {received} of {expected} answers")]
    MissingAnswers { expected: usize, received: usize },
    #[error("session cannot complete without a ticket channel")]
    MissingTicketChannel,
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SessionState, event: LifecycleEvent },
}
