//! HTTP Handlers

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use assistant_core::{
    stream::{markdown_prompt, EventStream, ERROR_EVENT, MESSAGE_EVENT},
    AgentError,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct AssistantResponse {
    pub response: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Any failure surfaces as 500 with the error text as `detail`
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Assistant request failed: {}", self.0);
        let body = ErrorResponse {
            detail: self.0.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Answer a prompt, either as one JSON body or as server-sent events
pub async fn assistant_handler(
    State(state): State<AppState>,
    Json(request): Json<AssistantRequest>,
) -> Result<Response, ApiError> {
    if request.stream {
        let prompt = markdown_prompt(&request.prompt);
        let events = state.session.lock().await.stream(&prompt).await?;
        return Ok(Sse::new(sse_events(events))
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let response = state.session.lock().await.process(&request.prompt).await?;
    Ok(Json(AssistantResponse { response }).into_response())
}

/// `message` events carrying `{"content": ...}`; a failure becomes one
/// final `error` event carrying `{"detail": ...}`
fn sse_events(events: EventStream) -> impl Stream<Item = Result<Event, Infallible>> {
    events.map(|event| {
        let sse = match event {
            Ok(event) => Event::default().event(MESSAGE_EVENT).data(event.payload()),
            Err(e) => {
                tracing::warn!("Stream ended with error: {}", e);
                Event::default()
                    .event(ERROR_EVENT)
                    .data(serde_json::json!({ "detail": e.to_string() }).to_string())
            }
        };
        Ok(sse)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assistant_core::{
        message::Message,
        provider::{Completion, GenerationOptions, LlmProvider, ModelInfo},
        AgentSession, CloudToolFactory, RemoteServers, Result, SessionManager,
    };
    use assistant_runtime::McpConnector;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use tower::ServiceExt;

    use super::*;

    /// Answers with the last user message in upper case, or fails on "boom"
    struct ShoutProvider;

    #[async_trait]
    impl LlmProvider for ShoutProvider {
        fn name(&self) -> &str {
            "shout"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last.contains("boom") {
                return Err(AgentError::Provider("model exploded".into()));
            }
            Ok(Completion::text(&options.model, last.trim().to_uppercase()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn app() -> axum::Router {
        let session = AgentSession::new(
            Arc::new(ShoutProvider),
            CloudToolFactory::with_defaults(),
            SessionManager::new(Arc::new(McpConnector::new()), RemoteServers::new()),
        );
        crate::router(AppState::new(session))
    }

    fn post(body: serde_json::Value) -> Request<Body> {
        Request::post("/assistant")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn test_plain_response() {
        let response = app().oneshot(post(serde_json::json!({"prompt": "hello"}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["response"], "HELLO");
    }

    #[tokio::test]
    async fn test_streamed_response() {
        let response = app()
            .oneshot(post(serde_json::json!({"prompt": "list buckets", "stream": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_text(response).await;
        assert!(body.contains("event: message"));
        assert!(body.contains("LIST BUCKETS"));
        // the formatted prompt itself is never echoed back
        assert!(!body.contains("proper markdown formatting"));
    }

    #[tokio::test]
    async fn test_failure_is_500_with_detail() {
        let response = app().oneshot(post(serde_json::json!({"prompt": "boom"}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("model exploded"));
    }

    #[tokio::test]
    async fn test_stream_failure_becomes_error_event() {
        let response = app()
            .oneshot(post(serde_json::json!({"prompt": "boom", "stream": true})))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("event: error"));
        assert!(body.contains("model exploded"));
    }
}
