//! The turn pipeline: classify, then resolve, then record.
//!
//! # Flow
//!
//! 1. Pin the session's active topic and append the user turn
//! 2. Ask the classifier whether the question belongs to that topic
//! 3. Resolve a reply: knowledge-base answer or the topic's refusal
//! 4. Append the assistant turn under the pinned topic
//!
//! Steps 2 and 3 run strictly in sequence. Nothing in the pipeline fails
//! outward except input validation and the one-turn-per-session rule.
//!
//! If a turn is dropped between steps 1 and 4 (cancelled request, panic in a
//! service), the pinned topic still gets an assistant turn carrying
//! [`INTERRUPTED_ANSWER`](crate::session::INTERRUPTED_ANSWER) and the
//! session is released.

use std::sync::Arc;

use knowdesk_config::AppConfig;
use knowdesk_core::provider::{KnowledgeBase, TextGenerator};
use knowdesk_core::{SessionError, Topic, Turn, Verdict};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::classifier::TopicClassifier;
use crate::resolver::AnswerResolver;
use crate::session::{SessionHandle, SessionState};

/// Everything one turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    /// The topic the turn was pinned to at submission
    pub topic: Topic,
    pub verdict: Verdict,
    pub user_turn: Turn,
    pub assistant_turn: Turn,
}

pub struct TurnPipeline {
    classifier: TopicClassifier,
    resolver: AnswerResolver,
}

impl TurnPipeline {
    pub fn new(classifier: TopicClassifier, resolver: AnswerResolver) -> Self {
        Self {
            classifier,
            resolver,
        }
    }

    /// Wire the pipeline to its two services using the application config.
    pub fn from_config(
        config: &AppConfig,
        generator: Arc<dyn TextGenerator>,
        knowledge_base: Arc<dyn KnowledgeBase>,
    ) -> Self {
        Self::new(
            TopicClassifier::from_config(generator, &config.classifier),
            AnswerResolver::from_config(knowledge_base, config),
        )
    }

    /// Classify and resolve a question without touching any session.
    pub async fn answer(&self, topic: Topic, question: &str) -> String {
        self.evaluate(topic, question).await.1
    }

    async fn evaluate(&self, topic: Topic, question: &str) -> (Verdict, String) {
        let verdict = self.classifier.classify(topic, question).await;
        let reply = self.resolver.resolve(topic, question, verdict).await;
        (verdict, reply)
    }

    /// Run one turn against a session the caller owns exclusively.
    pub async fn run_turn(
        &self,
        session: &mut SessionState,
        question: &str,
    ) -> Result<TurnRecord, SessionError> {
        let (topic, user_turn) = session.begin_turn(question)?;
        let session_id = session.id().to_string();
        info!(session = %session_id, topic = %topic, "Turn started");

        let open = OpenTurn {
            session,
            topic,
            finished: false,
        };
        let (verdict, reply) = self.evaluate(topic, question).await;
        let assistant_turn = open.finish(reply);

        info!(session = %session_id, topic = %topic, verdict = %verdict, "Turn completed");
        Ok(TurnRecord {
            topic,
            verdict,
            user_turn,
            assistant_turn,
        })
    }

    /// Run one turn against a shared session.
    ///
    /// The session lock is held only while recording turns, so topic switches
    /// and reads proceed while the services are being called. The answer is
    /// still appended under the topic that was active at submission.
    pub async fn submit(
        &self,
        handle: &SessionHandle,
        question: &str,
    ) -> Result<TurnRecord, SessionError> {
        let (topic, user_turn) = handle.lock().await.begin_turn(question)?;
        info!(session = %handle.id(), topic = %topic, "Turn started");

        let open = SharedOpenTurn {
            handle,
            topic,
            finished: false,
        };
        let (verdict, reply) = self.evaluate(topic, question).await;
        let assistant_turn = open.finish(reply).await;

        info!(session = %handle.id(), topic = %topic, verdict = %verdict, "Turn completed");
        Ok(TurnRecord {
            topic,
            verdict,
            user_turn,
            assistant_turn,
        })
    }
}

/// A started turn on an exclusively borrowed session.
struct OpenTurn<'a> {
    session: &'a mut SessionState,
    topic: Topic,
    finished: bool,
}

impl OpenTurn<'_> {
    fn finish(mut self, reply: String) -> Turn {
        self.finished = true;
        self.session.complete_turn(self.topic, reply)
    }
}

impl Drop for OpenTurn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(session = %self.session.id(), topic = %self.topic, "Turn dropped before its answer, closing it");
            self.session.abandon_turn(self.topic);
        }
    }
}

/// A started turn on a shared session.
struct SharedOpenTurn<'a> {
    handle: &'a SessionHandle,
    topic: Topic,
    finished: bool,
}

impl SharedOpenTurn<'_> {
    async fn finish(mut self, reply: String) -> Turn {
        let turn = self.handle.lock().await.complete_turn(self.topic, reply);
        self.finished = true;
        turn
    }
}

impl Drop for SharedOpenTurn<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(session = %self.handle.id(), topic = %self.topic, "Turn dropped before its answer, closing it");

        let topic = self.topic;
        if let Ok(mut session) = self.handle.try_lock() {
            session.abandon_turn(topic);
            return;
        }

        // Someone else holds the lock; close the turn once it is released.
        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    handle.lock().await.abandon_turn(topic);
                });
            }
            Err(_) => {
                error!(session = %handle.id(), "No runtime to close the dropped turn, session stays busy");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::INTERRUPTED_ANSWER;
    use crate::test_helpers::{GatedKnowledgeBase, ScriptedGenerator, ScriptedKnowledgeBase};
    use knowdesk_config::{MAX_VERDICT_TOKENS, RefusalMessages};
    use knowdesk_core::{ProviderError, Role};

    fn pipeline(
        generator: &Arc<ScriptedGenerator>,
        kb: Arc<dyn KnowledgeBase>,
    ) -> TurnPipeline {
        TurnPipeline::from_config(&AppConfig::default(), generator.clone(), kb)
    }

    #[tokio::test]
    async fn every_turn_appends_user_then_assistant() {
        for topic in Topic::ALL {
            for verdict in Verdict::ALL {
                let generator = Arc::new(ScriptedGenerator::replying(&[verdict.token()]));
                let kb = Arc::new(ScriptedKnowledgeBase::answering(&["An answer."]));
                let p = pipeline(&generator, kb);

                let mut session = SessionState::with_id("s");
                session.set_active_topic(topic);
                let record = p.run_turn(&mut session, "Some question").await.unwrap();

                let turns = session.log().read_all(topic);
                assert_eq!(turns.len(), 2);
                assert_eq!(turns[0].role, Role::User);
                assert_eq!(turns[0].content, "Some question");
                assert_eq!(turns[1].role, Role::Assistant);
                assert!(!turns[1].content.is_empty());
                assert_eq!(record.topic, topic);
                assert_eq!(record.verdict, verdict);
                assert_eq!(session.log().len(), 2);
            }
        }
    }

    #[tokio::test]
    async fn on_topic_hr_question_is_answered_from_knowledge_base() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[
            "Full-time employees receive 20 days of paid vacation per year.",
        ]));
        let p = pipeline(&generator, kb.clone());

        let mut session = SessionState::with_id("s");
        session.set_active_topic(Topic::HrPolicies);
        let record = p
            .run_turn(&mut session, "How many vacation days do I get?")
            .await
            .unwrap();

        assert_eq!(
            record.assistant_turn.content,
            "Full-time employees receive 20 days of paid vacation per year."
        );
        let queries = kb.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].text.contains("HR Policies"));
        assert!(queries[0].text.contains("How many vacation days do I get?"));
    }

    #[tokio::test]
    async fn off_topic_uipath_question_is_refused() {
        let generator = Arc::new(ScriptedGenerator::replying(&["does_not_match"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = pipeline(&generator, kb.clone());

        let mut session = SessionState::with_id("s");
        let record = p.run_turn(&mut session, "What's the weather today?").await.unwrap();

        assert_eq!(
            record.assistant_turn.content,
            RefusalMessages::default().for_topic(Topic::UiPath)
        );
        assert_eq!(kb.call_count(), 0);
    }

    #[tokio::test]
    async fn classifier_outage_falls_back_to_refusal() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(ProviderError::Network(
            "dns error".into(),
        ))]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = pipeline(&generator, kb.clone());

        let mut session = SessionState::with_id("s");
        session.set_active_topic(Topic::Worksoft);
        let record = p.run_turn(&mut session, "How do I capture a process?").await.unwrap();

        assert_eq!(record.verdict, Verdict::Unclear);
        assert_eq!(
            record.assistant_turn.content,
            RefusalMessages::default().for_topic(Topic::Worksoft)
        );
        assert_eq!(kb.call_count(), 0);
    }

    #[tokio::test]
    async fn retrieval_outage_is_reported_in_reply() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches"]));
        let kb = Arc::new(ScriptedKnowledgeBase::new(vec![Err(
            ProviderError::AuthenticationFailed("expired token".into()),
        )]));
        let p = pipeline(&generator, kb);

        let mut session = SessionState::with_id("s");
        let record = p.run_turn(&mut session, "What is Orchestrator?").await.unwrap();
        assert!(record.assistant_turn.content.contains("Error"));
        assert_eq!(session.log().read_all(Topic::UiPath).len(), 2);
    }

    #[tokio::test]
    async fn turns_on_one_topic_leave_others_untouched() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches", "matches"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&["a1", "a2"]));
        let p = pipeline(&generator, kb);

        let mut session = SessionState::with_id("s");
        p.run_turn(&mut session, "UiPath question").await.unwrap();
        let uipath_before = session.log().read_all(Topic::UiPath).to_vec();

        session.set_active_topic(Topic::Worksoft);
        p.run_turn(&mut session, "Worksoft question").await.unwrap();
        session.set_active_topic(Topic::UiPath);

        assert_eq!(session.log().read_all(Topic::UiPath), uipath_before.as_slice());
        assert_eq!(session.log().read_all(Topic::Worksoft).len(), 2);
        assert!(session.log().read_all(Topic::HrPolicies).is_empty());
    }

    #[tokio::test]
    async fn answer_does_not_need_a_session() {
        let generator = Arc::new(ScriptedGenerator::replying(&["unclear"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = pipeline(&generator, kb);

        let reply = p.answer(Topic::HrPolicies, "Hmm?").await;
        assert_eq!(reply, RefusalMessages::default().for_topic(Topic::HrPolicies));
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_any_call() {
        let generator = Arc::new(ScriptedGenerator::replying(&[]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = pipeline(&generator, kb);

        let handle = SessionHandle::new(SessionState::with_id("s"));
        let err = p.submit(&handle, "  ").await.unwrap_err();
        assert_eq!(err, SessionError::EmptyQuestion);
        assert_eq!(generator.call_count(), 0);
        assert!(handle.lock().await.log().is_empty());
    }

    #[tokio::test]
    async fn topic_switch_mid_turn_keeps_answer_on_pinned_topic() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches"]));
        let kb = Arc::new(GatedKnowledgeBase::new("Studio is the design tool."));
        let p = Arc::new(pipeline(&generator, kb.clone()));
        let handle = SessionHandle::new(SessionState::with_id("s"));

        let task = {
            let p = p.clone();
            let handle = handle.clone();
            tokio::spawn(async move { p.submit(&handle, "What is Studio?").await })
        };

        kb.wait_until_called().await;

        // The session is not locked during the external call.
        handle.lock().await.set_active_topic(Topic::HrPolicies);
        let busy = p.submit(&handle, "Another question").await.unwrap_err();
        assert_eq!(busy, SessionError::TurnInProgress);

        kb.release();
        let record = task.await.unwrap().unwrap();

        assert_eq!(record.topic, Topic::UiPath);
        let session = handle.lock().await;
        assert_eq!(session.active_topic(), Topic::HrPolicies);
        let uipath = session.log().read_all(Topic::UiPath);
        assert_eq!(uipath.len(), 2);
        assert_eq!(uipath[1].content, "Studio is the design tool.");
        assert!(session.log().read_all(Topic::HrPolicies).is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn configured_pipeline_classifies_greedily_with_small_cap() {
        let mut config = AppConfig::default();
        config.classifier.model_id = "custom-classifier".into();
        config.classifier.max_tokens = 2048;

        let generator = Arc::new(ScriptedGenerator::replying(&["does_not_match"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = TurnPipeline::from_config(&config, generator.clone(), kb);
        p.answer(Topic::Worksoft, "What is Certify?").await;

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "custom-classifier");
        assert_eq!(requests[0].temperature, 0.0);
        assert!(requests[0].max_tokens <= MAX_VERDICT_TOKENS);
    }

    #[tokio::test]
    async fn dropped_submit_closes_turn_and_frees_session() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches", "does_not_match"]));
        let kb = Arc::new(GatedKnowledgeBase::new("never delivered"));
        let p = pipeline(&generator, kb.clone());
        let handle = SessionHandle::new(SessionState::with_id("s"));

        tokio::select! {
            _ = p.submit(&handle, "What is Studio?") => panic!("retrieval is still gated"),
            _ = kb.wait_until_called() => {}
        }

        {
            let session = handle.lock().await;
            assert!(!session.is_busy());
            let uipath = session.log().read_all(Topic::UiPath);
            assert_eq!(uipath.len(), 2);
            assert_eq!(uipath[0].content, "What is Studio?");
            assert_eq!(uipath[1].role, Role::Assistant);
            assert_eq!(uipath[1].content, INTERRUPTED_ANSWER);
        }

        let record = p.submit(&handle, "What's the weather today?").await.unwrap();
        assert_eq!(record.verdict, Verdict::DoesNotMatch);
        assert_eq!(handle.lock().await.log().read_all(Topic::UiPath).len(), 4);
    }

    #[tokio::test]
    async fn dropped_run_turn_closes_turn() {
        let generator = Arc::new(ScriptedGenerator::replying(&["matches"]));
        let kb = Arc::new(GatedKnowledgeBase::new("never delivered"));
        let p = pipeline(&generator, kb.clone());
        let mut session = SessionState::with_id("s");
        session.set_active_topic(Topic::HrPolicies);

        tokio::select! {
            _ = p.run_turn(&mut session, "Sick leave?") => panic!("retrieval is still gated"),
            _ = kb.wait_until_called() => {}
        }

        assert!(!session.is_busy());
        let hr = session.log().read_all(Topic::HrPolicies);
        assert_eq!(hr.len(), 2);
        assert_eq!(hr[1].content, INTERRUPTED_ANSWER);
    }

    #[tokio::test]
    async fn panicking_service_does_not_wedge_session() {
        // An exhausted scripted knowledge base panics when called.
        let generator = Arc::new(ScriptedGenerator::replying(&["matches", "unclear"]));
        let kb = Arc::new(ScriptedKnowledgeBase::answering(&[]));
        let p = Arc::new(pipeline(&generator, kb));
        let handle = SessionHandle::new(SessionState::with_id("s"));

        let task = {
            let p = p.clone();
            let handle = handle.clone();
            tokio::spawn(async move { p.submit(&handle, "What is Studio?").await })
        };
        assert!(task.await.unwrap_err().is_panic());

        {
            let session = handle.lock().await;
            assert!(!session.is_busy());
            let uipath = session.log().read_all(Topic::UiPath);
            assert_eq!(uipath.len(), 2);
            assert_eq!(uipath[1].content, INTERRUPTED_ANSWER);
        }

        let record = p.submit(&handle, "Anything else?").await.unwrap();
        assert_eq!(record.verdict, Verdict::Unclear);
    }
}
