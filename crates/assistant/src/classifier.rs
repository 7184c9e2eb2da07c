//! Topic classifier — decides whether a question belongs to the active topic.
//!
//! One deterministic call to the text generator with a tightly capped output.
//! The classifier never fails outward: a service error or an answer outside
//! the three allowed tokens both collapse to [`Verdict::Unclear`].

use std::sync::Arc;

use knowdesk_config::{ClassifierConfig, MAX_VERDICT_TOKENS};
use knowdesk_core::provider::{GenerationRequest, TextGenerator};
use knowdesk_core::{Topic, Verdict};
use tracing::{debug, warn};

/// Verdicts are always decoded greedily.
const CLASSIFIER_TEMPERATURE: f32 = 0.0;

/// Classifies a question against a topic using a text generator.
pub struct TopicClassifier {
    generator: Arc<dyn TextGenerator>,
    model: String,
    max_tokens: u32,
}

impl TopicClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            max_tokens: 10,
        }
    }

    /// The output cap is clamped to `1..=MAX_VERDICT_TOKENS` even if the
    /// config was never validated.
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &ClassifierConfig) -> Self {
        Self {
            generator,
            model: config.model_id.clone(),
            max_tokens: config.max_tokens.clamp(1, MAX_VERDICT_TOKENS),
        }
    }

    /// The instruction sent to the model.
    pub fn build_prompt(topic: Topic, question: &str) -> String {
        let [matches, does_not_match, unclear] = Verdict::ALL.map(Verdict::token);
        format!(
            "You are a topic classifier for an internal knowledge assistant.\n\
             \n\
             Selected topic: {topic}\n\
             User question: {question}\n\
             \n\
             Decide whether the question is about the selected topic.\n\
             Reply with exactly one of these words and nothing else:\n\
             {matches} - the question is about {topic}\n\
             {does_not_match} - the question is about something else\n\
             {unclear} - it is not possible to tell"
        )
    }

    /// Classify `question` against `topic`.
    pub async fn classify(&self, topic: Topic, question: &str) -> Verdict {
        let request = GenerationRequest {
            model: self.model.clone(),
            prompt: Self::build_prompt(topic, question),
            temperature: CLASSIFIER_TEMPERATURE,
            max_tokens: self.max_tokens,
        };

        match self.generator.generate(request).await {
            Ok(raw) => {
                let verdict = Verdict::from_model_output(&raw);
                if verdict == Verdict::Unclear && raw.trim().to_lowercase() != Verdict::Unclear.token() {
                    warn!(topic = %topic, output = %raw.trim(), "Unrecognized classifier output, treating as unclear");
                } else {
                    debug!(topic = %topic, verdict = %verdict, "Question classified");
                }
                verdict
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Classifier call failed, treating as unclear");
                Verdict::Unclear
            }
        }
    }
}
