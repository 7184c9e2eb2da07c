//! Scripted service stand-ins for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use knowdesk_core::error::ProviderError;
use knowdesk_core::provider::{
    GenerationRequest, KnowledgeAnswer, KnowledgeBase, KnowledgeQuery, TextGenerator,
};
use tokio::sync::Notify;

/// A text generator that returns a queue of scripted results.
///
/// Panics if called more times than results were provided.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!("ScriptedGenerator: no more responses (call #{})", requests.len())
        })
    }
}

/// A knowledge base that returns a queue of scripted results.
pub struct ScriptedKnowledgeBase {
    responses: Mutex<VecDeque<Result<KnowledgeAnswer, ProviderError>>>,
    queries: Mutex<Vec<KnowledgeQuery>>,
}

impl ScriptedKnowledgeBase {
    pub fn new(responses: Vec<Result<KnowledgeAnswer, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| {
                    Ok(KnowledgeAnswer {
                        text: t.to_string(),
                        citations: Vec::new(),
                    })
                })
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<KnowledgeQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for ScriptedKnowledgeBase {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn retrieve_and_generate(
        &self,
        query: KnowledgeQuery,
    ) -> Result<KnowledgeAnswer, ProviderError> {
        let mut queries = self.queries.lock().unwrap();
        queries.push(query);
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!("ScriptedKnowledgeBase: no more responses (call #{})", queries.len())
        })
    }
}

/// A knowledge base that blocks inside the call until released.
pub struct GatedKnowledgeBase {
    answer: String,
    entered: Notify,
    released: Notify,
}

impl GatedKnowledgeBase {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl KnowledgeBase for GatedKnowledgeBase {
    fn name(&self) -> &str {
        "gated"
    }

    async fn retrieve_and_generate(
        &self,
        _query: KnowledgeQuery,
    ) -> Result<KnowledgeAnswer, ProviderError> {
        self.entered.notify_one();
        self.released.notified().await;
        Ok(KnowledgeAnswer {
            text: self.answer.clone(),
            citations: Vec::new(),
        })
    }
}
