//! AWS credential source.
//!
//! Credentials live in `~/.knowdesk/secrets.toml`, never in `config.toml`:
//!
//! ```toml
//! AWS_ACCESS_KEY_ID = "AKIA..."
//! AWS_SECRET_ACCESS_KEY = "..."
//! AWS_DEFAULT_REGION = "us-east-1"
//! ```
//!
//! Environment variables with the same names take precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{AppConfig, ConfigError};

const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
const REGION_VAR: &str = "AWS_DEFAULT_REGION";
const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// Access key pair (plus optional STS session token) used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Region named by the credential source, if any
    pub region: Option<String>,
}

/// On-disk layout of `secrets.toml`.
#[derive(Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(rename = "AWS_ACCESS_KEY_ID", default)]
    access_key_id: Option<String>,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY", default)]
    secret_access_key: Option<String>,
    #[serde(rename = "AWS_DEFAULT_REGION", default)]
    region: Option<String>,
    #[serde(rename = "AWS_SESSION_TOKEN", default)]
    session_token: Option<String>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &"[REDACTED]")
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &redact(&self.session_token))
            .field("region", &self.region)
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            region: None,
        }
    }

    /// Load from the default secrets file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&AppConfig::secrets_path(), |key| std::env::var(key).ok())
    }

    /// Load from a specific secrets file, with `env` consulted first.
    ///
    /// A missing file is not an error as long as the environment supplies
    /// both halves of the key pair.
    pub fn load_from(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str::<SecretsFile>(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::debug!("No secrets file at {}", path.display());
            SecretsFile::default()
        };

        let pick = |var: &str, from_file: Option<String>| {
            env(var)
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let access_key_id = pick(ACCESS_KEY_VAR, file.access_key_id)
            .ok_or_else(|| ConfigError::MissingCredentials(format!("{ACCESS_KEY_VAR} is not set")))?;
        let secret_access_key = pick(SECRET_KEY_VAR, file.secret_access_key)
            .ok_or_else(|| ConfigError::MissingCredentials(format!("{SECRET_KEY_VAR} is not set")))?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: pick(SESSION_TOKEN_VAR, file.session_token),
            region: pick(REGION_VAR, file.region),
        })
    }

    /// The region to call: the credential source's, else the configured one.
    pub fn region_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.region.as_deref().unwrap_or(fallback)
    }

    /// Template written by `knowdesk onboard`.
    pub fn template_toml() -> String {
        format!(
            "# AWS credentials for Bedrock. Environment variables of the same name win.\n\
             {ACCESS_KEY_VAR} = \"\"\n\
             {SECRET_KEY_VAR} = \"\"\n\
             {REGION_VAR} = \"us-east-1\"\n"
        )
    }
}
