//! Amazon Bedrock text generation via the Converse API.
//!
//! `POST /model/{modelId}/converse` on the `bedrock-runtime` endpoint. One
//! user message in, the assistant's text blocks out.

use async_trait::async_trait;
use knowdesk_core::error::ProviderError;
use knowdesk_core::provider::{GenerationRequest, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{SignedClient, regional_endpoint};

/// Bedrock Runtime Converse API client.
pub struct BedrockTextGenerator {
    base_url: String,
    client: SignedClient,
}

impl BedrockTextGenerator {
    /// Create a generator talking to the regional public endpoint.
    pub fn new(client: SignedClient) -> Self {
        let base_url = regional_endpoint("bedrock-runtime", client.region());
        Self { base_url, client }
    }

    /// Use a custom endpoint (VPC endpoint, proxy, local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn converse_path(model: &str) -> String {
        format!("/model/{}/converse", urlencoding::encode(model))
    }

    fn to_api_request(request: &GenerationRequest) -> ConverseRequest {
        ConverseRequest {
            messages: vec![ConverseMessage {
                role: "user".into(),
                content: vec![ContentBlock {
                    text: Some(request.prompt.clone()),
                }],
            }],
            inference_config: InferenceConfig {
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            },
        }
    }

    /// Join the text blocks of the assistant message.
    fn response_text(resp: ConverseResponse) -> Result<String, ProviderError> {
        let message = resp.output.message.ok_or_else(|| {
            ProviderError::InvalidResponse("Converse response has no output message".into())
        })?;

        Ok(message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl TextGenerator for BedrockTextGenerator {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let body = serde_json::to_value(Self::to_api_request(&request))
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(provider = "bedrock", model = %request.model, "Sending converse request");

        let raw = self
            .client
            .post_json(&self.base_url, &Self::converse_path(&request.model), &body)
            .await?;

        let resp: ConverseResponse = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Converse response: {e}"))
        })?;

        if let Some(usage) = &resp.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Converse usage"
            );
        }

        Self::response_text(resp)
    }
}

// --- Converse API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ContentBlock>,
}

/// Only text blocks are used; other block kinds deserialize with `text: None`.
#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    #[serde(default)]
    message: Option<ConverseMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    input_tokens: u32,
    output_tokens: u32,
}
