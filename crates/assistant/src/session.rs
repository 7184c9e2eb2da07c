//! Per-user session state.
//!
//! A session owns the active topic selection and the per-topic conversation
//! logs. It is created by the caller (gateway registry or CLI loop) and passed
//! explicitly; there is no process-wide session.

use std::sync::Arc;

use knowdesk_core::{ConversationLog, SessionError, Topic, Turn};
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use uuid::Uuid;

/// Assistant reply recorded when a turn is abandoned before its answer arrives.
pub const INTERRUPTED_ANSWER: &str =
    "Error: the answer was interrupted before it completed. Please ask again.";

/// A user's topic selection and conversation logs.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: String,
    active_topic: Topic,
    log: ConversationLog,
    in_flight: bool,
}

impl SessionState {
    /// A fresh session on the default topic with empty logs.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active_topic: Topic::default(),
            log: ConversationLog::new(),
            in_flight: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn active_topic(&self) -> Topic {
        self.active_topic
    }

    /// Change the topic for subsequent questions. Never touches any log.
    pub fn set_active_topic(&mut self, topic: Topic) {
        self.active_topic = topic;
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Whether a turn has been started but not yet answered.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Start a turn: pin the active topic and record the user's question.
    ///
    /// Returns the pinned topic, which the answer must be appended under.
    pub fn begin_turn(&mut self, question: &str) -> Result<(Topic, Turn), SessionError> {
        if question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if self.in_flight {
            return Err(SessionError::TurnInProgress);
        }

        let topic = self.active_topic;
        let turn = Turn::user(question);
        self.log.append_turn(topic, turn.clone());
        self.in_flight = true;
        Ok((topic, turn))
    }

    /// Finish a turn by appending the answer under the topic pinned at start.
    pub fn complete_turn(&mut self, topic: Topic, answer: impl Into<String>) -> Turn {
        let turn = Turn::assistant(answer);
        self.log.append_turn(topic, turn.clone());
        self.in_flight = false;
        turn
    }

    /// Close a turn that will never be answered, keeping the log paired.
    pub fn abandon_turn(&mut self, topic: Topic) -> Turn {
        self.complete_turn(topic, INTERRUPTED_ANSWER)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// A session shared between concurrent requests.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn new(state: SessionState) -> Self {
        Self {
            id: Arc::from(state.id()),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// The session id, readable without taking the lock.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, SessionState>, TryLockError> {
        self.state.try_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowdesk_core::Role;

    #[test]
    fn new_session_starts_on_default_topic() {
        let s = SessionState::new();
        assert_eq!(s.active_topic(), Topic::UiPath);
        assert!(s.log().is_empty());
        assert!(!s.is_busy());
        assert!(!s.id().is_empty());
    }

    #[test]
    fn switching_topic_leaves_logs_alone() {
        let mut s = SessionState::with_id("s1");
        let (topic, _) = s.begin_turn("How do I build a queue?").unwrap();
        s.complete_turn(topic, "Use Orchestrator.");
        let before = s.log().read_all(Topic::UiPath).to_vec();

        s.set_active_topic(Topic::HrPolicies);
        s.set_active_topic(Topic::Worksoft);

        assert_eq!(s.active_topic(), Topic::Worksoft);
        assert_eq!(s.log().read_all(Topic::UiPath), before.as_slice());
        assert!(s.log().read_all(Topic::Worksoft).is_empty());
        assert!(s.log().read_all(Topic::HrPolicies).is_empty());
    }

    #[test]
    fn begin_turn_pins_topic_and_marks_busy() {
        let mut s = SessionState::with_id("s1");
        s.set_active_topic(Topic::HrPolicies);
        let (topic, turn) = s.begin_turn("Sick leave?").unwrap();

        assert_eq!(topic, Topic::HrPolicies);
        assert_eq!(turn.role, Role::User);
        assert!(s.is_busy());
        assert_eq!(s.log().read_all(Topic::HrPolicies).len(), 1);
    }

    #[test]
    fn second_turn_while_busy_is_rejected() {
        let mut s = SessionState::with_id("s1");
        s.begin_turn("first").unwrap();
        assert_eq!(s.begin_turn("second"), Err(SessionError::TurnInProgress));
        assert_eq!(s.log().len(), 1);
    }

    #[test]
    fn blank_question_is_rejected_without_logging() {
        let mut s = SessionState::with_id("s1");
        assert_eq!(s.begin_turn("   \n"), Err(SessionError::EmptyQuestion));
        assert!(s.log().is_empty());
        assert!(!s.is_busy());
    }

    #[test]
    fn complete_turn_appends_to_pinned_topic() {
        let mut s = SessionState::with_id("s1");
        let (topic, _) = s.begin_turn("q").unwrap();
        s.set_active_topic(Topic::Worksoft);
        s.complete_turn(topic, "a");

        assert!(!s.is_busy());
        let uipath = s.log().read_all(Topic::UiPath);
        assert_eq!(uipath.len(), 2);
        assert_eq!(uipath[1].role, Role::Assistant);
        assert!(s.log().read_all(Topic::Worksoft).is_empty());
    }

    #[test]
    fn abandoned_turn_is_closed_with_error_reply() {
        let mut s = SessionState::with_id("s1");
        let (topic, _) = s.begin_turn("q").unwrap();
        s.set_active_topic(Topic::HrPolicies);
        let turn = s.abandon_turn(topic);

        assert!(!s.is_busy());
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.starts_with("Error"));
        assert_eq!(s.log().read_all(Topic::UiPath).len(), 2);
        assert!(s.begin_turn("again").is_ok());
    }

    #[tokio::test]
    async fn handle_exposes_id_and_state() {
        let handle = SessionHandle::new(SessionState::with_id("abc"));
        assert_eq!(handle.id(), "abc");
        handle.lock().await.set_active_topic(Topic::Worksoft);
        let shared = handle.clone();
        assert_eq!(shared.lock().await.active_topic(), Topic::Worksoft);
    }
}
