//! HTTP gateway for Knowdesk.
//!
//! Serves the v1 JSON API, a health check, and the embedded chat frontend.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;
pub mod frontend;
mod rate_limit;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::rate_limit::RequestThrottle;

use knowdesk_assistant::TurnPipeline;
use knowdesk_config::{AppConfig, AwsCredentials, GatewayConfig};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the full router: health, v1 API and frontend.
///
/// Layers applied:
/// - CORS restricted to the gateway's own origin
/// - Request body size limit (64 KiB)
/// - In-memory rate limiting per client address (`/health` exempt)
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState, gateway: &GatewayConfig) -> Router {
    let origin = format!("http://{}:{}", gateway.host, gateway.port);
    let allow_origin = match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            warn!(origin = %origin, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let throttle = Arc::new(RequestThrottle::per_minute(gateway.rate_limit_per_minute));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(move |req, next| {
            rate_limit::throttle(throttle.clone(), req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire the pipeline into fresh gateway state.
pub fn api_state(config: &AppConfig, pipeline: Arc<TurnPipeline>) -> api_v1::SharedApiState {
    Arc::new(api_v1::ApiV1State::new(
        pipeline,
        config.gateway.max_sessions,
        config.history.preview_chars,
    ))
}

/// Start the gateway HTTP server against Amazon Bedrock.
pub async fn start(
    config: AppConfig,
    credentials: AwsCredentials,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = knowdesk_providers::build_from_config(&config, credentials);
    let pipeline = Arc::new(TurnPipeline::from_config(
        &config,
        services.generator,
        services.knowledge_base,
    ));
    serve(config, pipeline).await
}

/// Serve the gateway with an already-built pipeline.
pub async fn serve(
    config: AppConfig,
    pipeline: Arc<TurnPipeline>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(api_state(&config, pipeline), &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use knowdesk_core::error::ProviderError;
    use knowdesk_core::provider::{
        GenerationRequest, KnowledgeAnswer, KnowledgeBase, KnowledgeQuery, TextGenerator,
    };

    struct Unreachable;

    #[async_trait::async_trait]
    impl TextGenerator for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn generate(&self, _request: GenerationRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Network("offline".into()))
        }
    }

    #[async_trait::async_trait]
    impl KnowledgeBase for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn retrieve_and_generate(
            &self,
            _query: KnowledgeQuery,
        ) -> Result<KnowledgeAnswer, ProviderError> {
            Err(ProviderError::Network("offline".into()))
        }
    }

    fn test_router(gateway: GatewayConfig) -> Router {
        let config = AppConfig::default();
        let pipeline = TurnPipeline::from_config(&config, Arc::new(Unreachable), Arc::new(Unreachable));
        build_router(api_state(&config, Arc::new(pipeline)), &gateway)
    }

    async fn request(app: &Router, method: &str, uri: &str, body: Body) -> StatusCode {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        app.clone().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_router(GatewayConfig::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn serves_frontend_and_api_together() {
        let app = test_router(GatewayConfig::default());
        assert_eq!(request(&app, "GET", "/", Body::empty()).await, StatusCode::OK);
        assert_eq!(request(&app, "GET", "/v1/topics", Body::empty()).await, StatusCode::OK);
        assert_eq!(
            request(&app, "GET", "/v1/sessions/missing", Body::empty()).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn rate_limit_applies_except_health() {
        let app = test_router(GatewayConfig {
            rate_limit_per_minute: 2,
            ..GatewayConfig::default()
        });

        assert_eq!(request(&app, "GET", "/v1/topics", Body::empty()).await, StatusCode::OK);
        assert_eq!(request(&app, "GET", "/v1/topics", Body::empty()).await, StatusCode::OK);
        assert_eq!(
            request(&app, "GET", "/v1/topics", Body::empty()).await,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(request(&app, "GET", "/health", Body::empty()).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn throttled_response_carries_retry_after_and_json_error() {
        let app = test_router(GatewayConfig {
            rate_limit_per_minute: 1,
            ..GatewayConfig::default()
        });
        assert_eq!(request(&app, "GET", "/v1/topics", Body::empty()).await, StatusCode::OK);

        let req = Request::builder().uri("/v1/topics").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Too many requests"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = test_router(GatewayConfig::default());
        let req = Request::builder()
            .method("POST")
            .uri("/v1/sessions")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = created["session_id"].as_str().unwrap();

        let huge = serde_json::json!({"message": "x".repeat(MAX_BODY_BYTES + 1)}).to_string();
        let status = request(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Body::from(huge),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
