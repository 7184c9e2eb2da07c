//! Configuration loading, validation, and management for Knowdesk.
//!
//! Loads configuration from `~/.knowdesk/config.toml` with environment
//! variable overrides. Validates all settings at startup. AWS credentials are
//! kept out of this file and read separately (see [`credentials`]).

pub mod credentials;

use knowdesk_core::Topic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use credentials::AwsCredentials;

/// The root configuration structure.
///
/// Maps directly to `~/.knowdesk/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// AWS connection settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Topic classifier (text-generation) settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Knowledge base (retrieve-and-generate) settings
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Per-topic refusal messages for off-topic questions
    #[serde(default)]
    pub refusals: RefusalMessages,

    /// History summary settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region used when the credential source does not name one
    #[serde(default = "default_region")]
    pub region: String,

    /// Timeout for each outbound service call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Override for the Bedrock Runtime endpoint (e.g. a VPC endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_endpoint: Option<String>,

    /// Override for the Bedrock Agent Runtime endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_runtime_endpoint: Option<String>,
}

fn default_region() -> String {
    "us-east-1".into()
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            request_timeout_secs: default_request_timeout(),
            runtime_endpoint: None,
            agent_runtime_endpoint: None,
        }
    }
}

/// Largest classifier output cap accepted; one verdict word fits well within it.
pub const MAX_VERDICT_TOKENS: u32 = 16;

/// Sampling is always greedy; the classifier has no temperature setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_model")]
    pub model_id: String,

    /// Output cap; enough for one verdict token, not a sentence
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,
}

fn default_classifier_model() -> String {
    "anthropic.claude-3-haiku-20240307-v1:0".into()
}
fn default_classifier_max_tokens() -> u32 {
    10
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_id: default_classifier_model(),
            max_tokens: default_classifier_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_knowledge_base_id")]
    pub knowledge_base_id: String,

    #[serde(default = "default_model_arn")]
    pub model_arn: String,
}

fn default_knowledge_base_id() -> String {
    "HGWSAMUGCM".into()
}
fn default_model_arn() -> String {
    "arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-3-sonnet-20240229-v1:0".into()
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            knowledge_base_id: default_knowledge_base_id(),
            model_arn: default_model_arn(),
        }
    }
}

/// One refusal message per topic, keyed by topic slug in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusalMessages {
    #[serde(default = "default_uipath_refusal")]
    pub uipath: String,

    #[serde(default = "default_worksoft_refusal")]
    pub worksoft: String,

    #[serde(default = "default_hr_policies_refusal")]
    pub hr_policies: String,
}

fn default_uipath_refusal() -> String {
    "Your question doesn't appear to be about UiPath. Please ask about UiPath topics \
     such as Studio workflows, Orchestrator, robots, queues, or automation activities."
        .into()
}
fn default_worksoft_refusal() -> String {
    "Your question doesn't appear to be about Worksoft. Please ask about Worksoft topics \
     such as Certify test design, process capture, test execution, or results analysis."
        .into()
}
fn default_hr_policies_refusal() -> String {
    "Your question doesn't appear to be about HR Policies. Please ask about HR topics \
     such as leave and vacation, benefits, working hours, or the code of conduct."
        .into()
}

impl RefusalMessages {
    /// The refusal text shown when a question is judged off-topic.
    pub fn for_topic(&self, topic: Topic) -> &str {
        match topic {
            Topic::UiPath => &self.uipath,
            Topic::Worksoft => &self.worksoft,
            Topic::HrPolicies => &self.hr_policies,
        }
    }
}

impl Default for RefusalMessages {
    fn default() -> Self {
        Self {
            uipath: default_uipath_refusal(),
            worksoft: default_worksoft_refusal(),
            hr_policies: default_hr_policies_refusal(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Longest question preview, in characters, before it is cut with "..."
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_preview_chars() -> usize {
    50
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1_000
}
fn default_rate_limit() -> usize {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.knowdesk/config.toml).
    ///
    /// Environment variables override the file:
    /// - `KNOWDESK_REGION`
    /// - `KNOWDESK_KNOWLEDGE_BASE_ID`
    /// - `KNOWDESK_MODEL_ARN`
    /// - `KNOWDESK_CLASSIFIER_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(region) = env("KNOWDESK_REGION") {
            self.aws.region = region;
        }
        if let Some(id) = env("KNOWDESK_KNOWLEDGE_BASE_ID") {
            self.knowledge_base.knowledge_base_id = id;
        }
        if let Some(arn) = env("KNOWDESK_MODEL_ARN") {
            self.knowledge_base.model_arn = arn;
        }
        if let Some(model) = env("KNOWDESK_CLASSIFIER_MODEL") {
            self.classifier.model_id = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".knowdesk")
    }

    /// Path of the main config file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Path of the secrets file holding AWS credentials.
    pub fn secrets_path() -> PathBuf {
        Self::config_dir().join("secrets.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_VERDICT_TOKENS).contains(&self.classifier.max_tokens) {
            return Err(ConfigError::ValidationError(format!(
                "classifier.max_tokens must be between 1 and {MAX_VERDICT_TOKENS}"
            )));
        }

        if self.classifier.model_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "classifier.model_id must not be empty".into(),
            ));
        }

        if self.knowledge_base.knowledge_base_id.trim().is_empty()
            || self.knowledge_base.model_arn.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "knowledge_base.knowledge_base_id and knowledge_base.model_arn must be set".into(),
            ));
        }

        if let Some(topic) = Topic::ALL
            .into_iter()
            .find(|t| self.refusals.for_topic(*t).trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "refusals.{} must not be empty",
                topic.slug()
            )));
        }

        if self.history.preview_chars == 0 {
            return Err(ConfigError::ValidationError(
                "history.preview_chars must be > 0".into(),
            ));
        }

        if self.aws.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "aws.request_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("AWS credentials missing: {0}")]
    MissingCredentials(String),
}
