//! Process-wide ticket session tracking.
//!
//! The registry is created once at startup and injected wherever sessions are
//! read or mutated. It is purely in-memory: a restart or crash loses every
//! in-flight interview and forgets which channels belong to which requester.
//! Open ticket channels survive on the platform but their view/close buttons
//! stop resolving until staff delete them by hand.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::domain::ids::{ChannelId, RoleId, SessionId, UserId, UserRef};
use crate::domain::interview::{AnswerSheet, InterviewSpec};
use crate::domain::session::Session;
use crate::errors::DomainError;
use crate::flows::{LifecycleEvent, SessionState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("requester {0} already has an interview awaiting answers")]
    AlreadyActive(UserId),
    #[error("session {0} is no longer tracked")]
    UnknownSession(SessionId),
    #[error("ticket channel {0} is already bound to another session")]
    ChannelInUse(ChannelId),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub awaiting_answers: usize,
    pub completed: usize,
    pub abandoned: usize,
}

/// Abandoned sessions kept around so `get` can still report them.
pub const DEFAULT_ABANDONED_CAPACITY: usize = 256;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, Session>,
    latest_by_requester: HashMap<UserId, SessionId>,
    by_channel: HashMap<ChannelId, SessionId>,
    abandoned: VecDeque<SessionId>,
    abandoned_capacity: usize,
}

impl RegistryState {
    /// Records a freshly abandoned session, evicting the oldest ones beyond
    /// capacity.
    fn retire(&mut self, session_id: SessionId) {
        self.abandoned.push_back(session_id);
        while self.abandoned.len() > self.abandoned_capacity {
            let Some(evicted) = self.abandoned.pop_front() else {
                break;
            };
            if let Some(session) = self.sessions.remove(&evicted) {
                if self.latest_by_requester.get(&session.requester.id) == Some(&evicted) {
                    self.latest_by_requester.remove(&session.requester.id);
                }
            }
        }
    }
}

pub struct TicketSessionRegistry {
    interview: InterviewSpec,
    state: Arc<Mutex<RegistryState>>,
}

/// Exclusive write access to one `AwaitingAnswers` session.
///
/// Dropping the handle without completing or abandoning the session marks it
/// `Abandoned`, so a cancelled interview task never keeps the requester locked
/// out.
pub struct SessionHandle {
    session_id: SessionId,
    requester: UserId,
    state: Arc<Mutex<RegistryState>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn requester(&self) -> &UserId {
        &self.requester
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        let Some(session) = state.sessions.get_mut(&self.session_id) else {
            return;
        };
        if session.is_awaiting_answers() && session.abandon(LifecycleEvent::Cancelled).is_ok() {
            state.retire(self.session_id.clone());
        }
    }
}

impl TicketSessionRegistry {
    pub fn new(interview: InterviewSpec) -> Self {
        Self::with_abandoned_capacity(interview, DEFAULT_ABANDONED_CAPACITY)
    }

    /// Keeps at most `capacity` abandoned sessions; older ones are forgotten.
    pub fn with_abandoned_capacity(interview: InterviewSpec, capacity: usize) -> Self {
        let state = RegistryState { abandoned_capacity: capacity, ..RegistryState::default() };
        Self { interview, state: Arc::new(Mutex::new(state)) }
    }

    pub fn interview(&self) -> &InterviewSpec {
        &self.interview
    }

    /// Opens a new session. Never awaits, so two concurrent applies for the
    /// same requester are decided here before either interview starts.
    pub fn begin(
        &self,
        requester: UserRef,
        staff_role: RoleId,
    ) -> Result<SessionHandle, RegistryError> {
        let mut state = lock(&self.state);

        if let Some(previous_id) = state.latest_by_requester.get(&requester.id).cloned() {
            match state.sessions.get(&previous_id).map(Session::state) {
                Some(SessionState::AwaitingAnswers) => {
                    return Err(RegistryError::AlreadyActive(requester.id));
                }
                Some(SessionState::Abandoned) => {
                    state.sessions.remove(&previous_id);
                    state.abandoned.retain(|session_id| session_id != &previous_id);
                }
                Some(SessionState::Completed) | None => {}
            }
        }

        let session = Session::start(requester, staff_role);
        let handle = SessionHandle {
            session_id: session.id.clone(),
            requester: session.requester.id.clone(),
            state: Arc::clone(&self.state),
        };
        state.latest_by_requester.insert(session.requester.id.clone(), session.id.clone());
        state.sessions.insert(session.id.clone(), session);

        Ok(handle)
    }

    pub fn complete(
        &self,
        handle: SessionHandle,
        answers: AnswerSheet,
        channel_id: ChannelId,
    ) -> Result<Session, RegistryError> {
        let mut state = lock(&self.state);

        if state.by_channel.contains_key(&channel_id) {
            return Err(RegistryError::ChannelInUse(channel_id));
        }

        let session = state
            .sessions
            .get_mut(&handle.session_id)
            .ok_or_else(|| RegistryError::UnknownSession(handle.session_id.clone()))?;
        session.complete(answers, self.interview.len(), channel_id.clone())?;
        let completed = session.clone();

        state.by_channel.insert(channel_id, completed.id.clone());
        Ok(completed)
    }

    pub fn abandon(
        &self,
        handle: SessionHandle,
        event: LifecycleEvent,
    ) -> Result<TransitionOutcome, RegistryError> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&handle.session_id)
            .ok_or_else(|| RegistryError::UnknownSession(handle.session_id.clone()))?;

        let outcome = session.abandon(event)?;
        state.retire(handle.session_id.clone());
        Ok(outcome)
    }

    /// Latest session started by `requester`, in whatever state it is in.
    pub fn get(&self, requester: &UserId) -> Option<Session> {
        let state = lock(&self.state);
        let session_id = state.latest_by_requester.get(requester)?;
        state.sessions.get(session_id).cloned()
    }

    pub fn session_for_channel(&self, channel_id: &ChannelId) -> Option<Session> {
        let state = lock(&self.state);
        let session_id = state.by_channel.get(channel_id)?;
        state.sessions.get(session_id).cloned()
    }

    /// Forgets the session bound to a ticket channel that has been deleted.
    pub fn close(&self, channel_id: &ChannelId) -> Option<Session> {
        let mut state = lock(&self.state);
        let session_id = state.by_channel.remove(channel_id)?;
        let session = state.sessions.remove(&session_id)?;

        if state.latest_by_requester.get(&session.requester.id) == Some(&session_id) {
            state.latest_by_requester.remove(&session.requester.id);
        }
        Some(session)
    }

    pub fn counts(&self) -> SessionCounts {
        let state = lock(&self.state);
        state.sessions.values().fold(SessionCounts::default(), |mut counts, session| {
            match session.state() {
                SessionState::AwaitingAnswers => counts.awaiting_answers += 1,
                SessionState::Completed => counts.completed += 1,
                SessionState::Abandoned => counts.abandoned += 1,
            }
            counts
        })
    }

    /// Interviews currently holding a requester lock.
    pub fn active_count(&self) -> usize {
        self.counts().awaiting_answers
    }
}

impl Default for TicketSessionRegistry {
    fn default() -> Self {
        Self::new(InterviewSpec::default())
    }
}

fn lock(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
