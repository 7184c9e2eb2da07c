//! Answer resolver — turns a verdict into the assistant's reply.
//!
//! On-topic questions go to the knowledge base; everything else gets the
//! topic's refusal message. The resolver always produces non-empty text and
//! makes at most one outbound call.

use std::sync::Arc;

use knowdesk_config::{AppConfig, RefusalMessages};
use knowdesk_core::provider::{KnowledgeBase, KnowledgeQuery};
use knowdesk_core::{Topic, Verdict};
use tracing::{debug, error};

/// Reply used when the knowledge base answers with nothing but whitespace.
pub const EMPTY_ANSWER_FALLBACK: &str =
    "The knowledge base did not return an answer for this question.";

/// Prefix of the reply when retrieval fails.
pub const RETRIEVAL_ERROR_PREFIX: &str = "Error retrieving answer";

pub struct AnswerResolver {
    knowledge_base: Arc<dyn KnowledgeBase>,
    knowledge_base_id: String,
    model_arn: String,
    refusals: RefusalMessages,
}

impl AnswerResolver {
    pub fn new(
        knowledge_base: Arc<dyn KnowledgeBase>,
        knowledge_base_id: impl Into<String>,
        model_arn: impl Into<String>,
        refusals: RefusalMessages,
    ) -> Self {
        Self {
            knowledge_base,
            knowledge_base_id: knowledge_base_id.into(),
            model_arn: model_arn.into(),
            refusals,
        }
    }

    pub fn from_config(knowledge_base: Arc<dyn KnowledgeBase>, config: &AppConfig) -> Self {
        Self::new(
            knowledge_base,
            config.knowledge_base.knowledge_base_id.clone(),
            config.knowledge_base.model_arn.clone(),
            config.refusals.clone(),
        )
    }

    /// The retrieval query: the question tagged with its topic.
    pub fn build_query(topic: Topic, question: &str) -> String {
        format!("Topic: {topic}. Question: {question}")
    }

    /// Produce the assistant reply for a classified question.
    pub async fn resolve(&self, topic: Topic, question: &str, verdict: Verdict) -> String {
        match verdict {
            Verdict::Matches => self.retrieve(topic, question).await,
            Verdict::DoesNotMatch | Verdict::Unclear => {
                debug!(topic = %topic, verdict = %verdict, "Refusing off-topic question");
                self.refusals.for_topic(topic).to_string()
            }
        }
    }

    async fn retrieve(&self, topic: Topic, question: &str) -> String {
        let query = KnowledgeQuery {
            text: Self::build_query(topic, question),
            knowledge_base_id: self.knowledge_base_id.clone(),
            model_arn: self.model_arn.clone(),
        };

        match self.knowledge_base.retrieve_and_generate(query).await {
            Ok(answer) => {
                debug!(topic = %topic, citations = answer.citations.len(), "Knowledge base answered");
                let text = answer.text.trim();
                if text.is_empty() {
                    EMPTY_ANSWER_FALLBACK.to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                error!(topic = %topic, error = %e, "Knowledge base retrieval failed");
                format!("{RETRIEVAL_ERROR_PREFIX}: {e}")
            }
        }
    }
}
