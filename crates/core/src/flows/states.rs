use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    AwaitingAnswers,
    Completed,
    Abandoned,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingAnswers => "awaiting_answers",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    AnswersCollected,
    StepTimedOut { step: usize },
    ProvisioningFailed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LifecycleContext {
    pub expected_answers: usize,
    pub received_answers: usize,
    pub ticket_channel_assigned: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    RecordTicketChannel,
    NotifyRequesterTimeout,
    NotifyRequesterFailure,
    ReleaseInterviewSlot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: SessionState,
    pub to: SessionState,
    pub event: LifecycleEvent,
    pub actions: Vec<LifecycleAction>,
}
