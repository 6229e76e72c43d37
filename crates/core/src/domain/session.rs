use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, RoleId, SessionId, UserRef};
use crate::domain::interview::AnswerSheet;
use crate::errors::DomainError;
use crate::flows::{LifecycleContext, LifecycleEngine, LifecycleEvent, TransitionOutcome};

pub use crate::flows::SessionState;

/// One application attempt by one requester.
///
/// `ticket_channel` is set exactly when `state` is `Completed`; the only
/// mutators are [`Session::complete`] and [`Session::abandon`], which run
/// through the lifecycle engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub requester: UserRef,
    pub staff_role: RoleId,
    state: SessionState,
    answers: Option<AnswerSheet>,
    ticket_channel: Option<ChannelId>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn start(requester: UserRef, staff_role: RoleId) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            requester,
            staff_role,
            state: LifecycleEngine.initial_state(),
            answers: None,
            ticket_channel: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn answers(&self) -> Option<&AnswerSheet> {
        self.answers.as_ref()
    }

    pub fn ticket_channel(&self) -> Option<&ChannelId> {
        self.ticket_channel.as_ref()
    }

    pub fn player_tag(&self) -> Option<&str> {
        self.answers.as_ref().and_then(AnswerSheet::player_tag)
    }

    pub fn is_awaiting_answers(&self) -> bool {
        self.state == SessionState::AwaitingAnswers
    }

    /// `ticket_channel` present iff `Completed`.
    pub fn is_consistent(&self) -> bool {
        (self.state == SessionState::Completed) == self.ticket_channel.is_some()
    }

    pub fn complete(
        &mut self,
        answers: AnswerSheet,
        expected_answers: usize,
        channel_id: ChannelId,
    ) -> Result<TransitionOutcome, DomainError> {
        let context = LifecycleContext {
            expected_answers,
            received_answers: answers.len(),
            ticket_channel_assigned: !channel_id.as_str().is_empty(),
        };
        let outcome =
            LifecycleEngine.apply(self.state, &LifecycleEvent::AnswersCollected, &context)?;

        self.state = outcome.to;
        self.answers = Some(answers);
        self.ticket_channel = Some(channel_id);
        self.updated_at = Utc::now();
        Ok(outcome)
    }

    pub fn abandon(&mut self, event: LifecycleEvent) -> Result<TransitionOutcome, DomainError> {
        let outcome = LifecycleEngine.apply(self.state, &event, &LifecycleContext::default())?;

        self.state = outcome.to;
        self.ticket_channel = None;
        self.updated_at = Utc::now();
        Ok(outcome)
    }
}
