//! Service traits — the abstraction over the external AI services.
//!
//! The pipeline depends on two collaborators:
//! - a [`TextGenerator`] that turns a single prompt into text (used by the
//!   topic classifier), and
//! - a [`KnowledgeBase`] that retrieves from a managed document index and
//!   synthesizes an answer (used by the answer resolver).
//!
//! Implementations: Amazon Bedrock (see `knowdesk-providers`), plus scripted
//! mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single-prompt generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "anthropic.claude-3-haiku-20240307-v1:0")
    pub model: String,

    /// The full prompt text
    pub prompt: String,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// A retrieve-and-generate request against a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    /// The query text, already tagged with the topic
    pub text: String,

    /// Identifier of the pre-indexed knowledge base
    pub knowledge_base_id: String,

    /// Identifier (ARN) of the model that writes the answer
    pub model_arn: String,
}

/// An answer synthesized from the knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeAnswer {
    /// The generated answer text
    pub text: String,

    /// Source locations of the retrieved passages, if the service reported any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
}

/// Text generation from a single prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this backend (e.g., "bedrock").
    fn name(&self) -> &str;

    /// Generate text for the prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError>;
}

/// Retrieval-augmented answer generation over a managed knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// A human-readable name for this backend (e.g., "bedrock-kb").
    fn name(&self) -> &str;

    /// Retrieve relevant passages and generate an answer grounded in them.
    async fn retrieve_and_generate(
        &self,
        query: KnowledgeQuery,
    ) -> Result<KnowledgeAnswer, ProviderError>;
}
