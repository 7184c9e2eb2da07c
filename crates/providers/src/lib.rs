//! Amazon Bedrock clients for Knowdesk.
//!
//! [`BedrockTextGenerator`] implements `knowdesk_core::TextGenerator` over the
//! Converse API and [`BedrockKnowledgeBase`] implements
//! `knowdesk_core::KnowledgeBase` over RetrieveAndGenerate. Both share a
//! SigV4-signing HTTP transport.

pub mod bedrock;
pub mod client;
pub mod knowledge_base;
pub mod sigv4;

pub use bedrock::BedrockTextGenerator;
pub use client::SignedClient;
pub use knowledge_base::BedrockKnowledgeBase;

use std::sync::Arc;
use std::time::Duration;

use knowdesk_config::{AppConfig, AwsCredentials};
use knowdesk_core::provider::{KnowledgeBase, TextGenerator};

/// The two Bedrock services the assistant talks to.
pub struct BedrockServices {
    pub generator: Arc<dyn TextGenerator>,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
}

/// Build both Bedrock clients from configuration.
///
/// The region named by the credential source wins over `aws.region`.
/// Endpoint overrides in `[aws]` replace the public regional endpoints.
pub fn build_from_config(config: &AppConfig, credentials: AwsCredentials) -> BedrockServices {
    let region = credentials.region_or(&config.aws.region).to_string();
    let timeout = Duration::from_secs(config.aws.request_timeout_secs);

    let mut generator =
        BedrockTextGenerator::new(SignedClient::new(credentials.clone(), &region, timeout));
    if let Some(url) = &config.aws.runtime_endpoint {
        generator = generator.with_base_url(url.clone());
    }

    let mut knowledge_base =
        BedrockKnowledgeBase::new(SignedClient::new(credentials, &region, timeout));
    if let Some(url) = &config.aws.agent_runtime_endpoint {
        knowledge_base = knowledge_base.with_base_url(url.clone());
    }

    tracing::info!(region = %region, "Bedrock clients ready");

    BedrockServices {
        generator: Arc::new(generator),
        knowledge_base: Arc::new(knowledge_base),
    }
}
