//! Bedrock Knowledge Base retrieval via RetrieveAndGenerate.
//!
//! `POST /retrieveAndGenerate` on the `bedrock-agent-runtime` endpoint.
//! The service retrieves passages from the knowledge base and has the model
//! compose a grounded answer from them.

use async_trait::async_trait;
use knowdesk_core::error::ProviderError;
use knowdesk_core::provider::{KnowledgeAnswer, KnowledgeBase, KnowledgeQuery};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{SignedClient, regional_endpoint};

const RETRIEVE_AND_GENERATE_PATH: &str = "/retrieveAndGenerate";

/// Bedrock Agent Runtime knowledge base client.
pub struct BedrockKnowledgeBase {
    base_url: String,
    client: SignedClient,
}

impl BedrockKnowledgeBase {
    pub fn new(client: SignedClient) -> Self {
        let base_url = regional_endpoint("bedrock-agent-runtime", client.region());
        Self { base_url, client }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_request(query: &KnowledgeQuery) -> RetrieveAndGenerateRequest {
        RetrieveAndGenerateRequest {
            input: RetrieveInput {
                text: query.text.clone(),
            },
            retrieve_and_generate_configuration: RetrieveConfiguration {
                kind: "KNOWLEDGE_BASE".into(),
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: query.knowledge_base_id.clone(),
                    model_arn: query.model_arn.clone(),
                },
            },
        }
    }

    fn to_answer(resp: RetrieveAndGenerateResponse) -> KnowledgeAnswer {
        let mut citations: Vec<String> = Vec::new();
        for reference in resp.citations.iter().flat_map(|c| &c.retrieved_references) {
            if let Some(source) = reference.location.as_ref().and_then(Location::source) {
                if !citations.contains(&source) {
                    citations.push(source);
                }
            }
        }

        KnowledgeAnswer {
            text: resp.output.text,
            citations,
        }
    }
}

#[async_trait]
impl KnowledgeBase for BedrockKnowledgeBase {
    fn name(&self) -> &str {
        "bedrock-knowledge-base"
    }

    async fn retrieve_and_generate(
        &self,
        query: KnowledgeQuery,
    ) -> Result<KnowledgeAnswer, ProviderError> {
        let body = serde_json::to_value(Self::to_api_request(&query))
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(
            knowledge_base_id = %query.knowledge_base_id,
            query_len = query.text.len(),
            "Sending retrieveAndGenerate request"
        );

        let raw = self
            .client
            .post_json(&self.base_url, RETRIEVE_AND_GENERATE_PATH, &body)
            .await?;

        let resp: RetrieveAndGenerateResponse = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse RetrieveAndGenerate response: {e}"
            ))
        })?;

        if let Some(session_id) = &resp.session_id {
            debug!(session_id = %session_id, "Knowledge base session");
        }

        Ok(Self::to_answer(resp))
    }
}

// --- RetrieveAndGenerate API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateRequest {
    input: RetrieveInput,
    retrieve_and_generate_configuration: RetrieveConfiguration,
}

#[derive(Debug, Serialize)]
struct RetrieveInput {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveConfiguration {
    #[serde(rename = "type")]
    kind: String,
    knowledge_base_configuration: KnowledgeBaseConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseConfiguration {
    knowledge_base_id: String,
    model_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateResponse {
    output: RetrieveOutput,
    #[serde(default)]
    citations: Vec<Citation>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrieveOutput {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Citation {
    #[serde(default)]
    retrieved_references: Vec<RetrievedReference>,
}

#[derive(Debug, Deserialize)]
struct RetrievedReference {
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    #[serde(default)]
    s3_location: Option<UriLocation>,
    #[serde(default)]
    web_location: Option<UrlLocation>,
    #[serde(default)]
    confluence_location: Option<UrlLocation>,
    #[serde(default)]
    share_point_location: Option<UrlLocation>,
}

#[derive(Debug, Deserialize)]
struct UriLocation {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct UrlLocation {
    url: String,
}

impl Location {
    fn source(&self) -> Option<String> {
        self.s3_location
            .as_ref()
            .map(|l| l.uri.clone())
            .or_else(|| self.web_location.as_ref().map(|l| l.url.clone()))
            .or_else(|| self.confluence_location.as_ref().map(|l| l.url.clone()))
            .or_else(|| self.share_point_location.as_ref().map(|l| l.url.clone()))
    }
}
