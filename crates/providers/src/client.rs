//! Signed JSON-over-HTTPS transport shared by the Bedrock clients.

use knowdesk_config::AwsCredentials;
use knowdesk_core::error::ProviderError;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sigv4::{SigV4Signer, SigningRequest};

/// Signing name for every Bedrock endpoint.
pub const BEDROCK_SERVICE: &str = "bedrock";

/// An HTTP client that signs each request for one AWS service and region.
pub struct SignedClient {
    http: reqwest::Client,
    signer: SigV4Signer,
}

impl SignedClient {
    pub fn new(credentials: AwsCredentials, region: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            signer: SigV4Signer::new(credentials, region, BEDROCK_SERVICE),
        }
    }

    pub fn region(&self) -> &str {
        self.signer.region()
    }

    /// POST a JSON body to `base_url` + `path` and return the raw success body.
    ///
    /// `path` must already be percent-encoded the way it goes on the wire.
    pub async fn post_json(
        &self,
        base_url: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let url = format!("{base_url}{path}");
        let parsed = reqwest::Url::parse(&url)
            .map_err(|e| ProviderError::NotConfigured(format!("Invalid endpoint '{url}': {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(ProviderError::NotConfigured(format!(
                    "Endpoint '{url}' has no host"
                )));
            }
        };

        let payload = serde_json::to_vec(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to encode request: {e}")))?;

        let content_type = "application/json";
        let signed = self.signer.sign(
            &SigningRequest {
                method: "POST",
                host: &host,
                path,
                query: &[],
                headers: &[("content-type", content_type)],
                payload: &payload,
            },
            chrono::Utc::now(),
        );

        debug!(url = %url, bytes = payload.len(), "Sending signed request");

        let mut request = self
            .http
            .post(parsed)
            .header("Content-Type", content_type)
            .header("Accept", "application/json")
            .body(payload);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        if (200..300).contains(&status) {
            return Ok(text);
        }

        warn!(status, error_type = ?error_type, "Bedrock API error");
        Err(map_error(status, error_type.as_deref(), &text))
    }
}

/// Translate an AWS error response into a [`ProviderError`].
pub(crate) fn map_error(status: u16, error_type: Option<&str>, body: &str) -> ProviderError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    let message = match error_type {
        Some(kind) => format!("{kind}: {message}"),
        None => message,
    };

    match status {
        429 => ProviderError::RateLimited(message),
        401 | 403 => ProviderError::AuthenticationFailed(message),
        408 => ProviderError::Timeout(message),
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}

/// Host name of a regional Bedrock endpoint, e.g. `bedrock-runtime`.
pub(crate) fn regional_endpoint(prefix: &str, region: &str) -> String {
    format!("https://{prefix}.{region}.amazonaws.com")
}
