//! HTTP API surface
//!
//! Exposes the orchestrator over JSON request/response: health, the tool
//! catalog, direct tool calls, provider status, primitive model chat, the
//! step loop, and session management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::{Agent, AutoInteraction, HistoryEntry};
use crate::providers::ToolCall;
use crate::session::SessionRegistry;

// ---- App State ----

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(agent: Arc<Agent>) -> Self {
        AppState {
            agent,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

// ---- Error Handling ----

#[derive(Debug)]
struct AppError(crate::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(ApiResponse::<Value>::failure(self.0.to_string()));
        (status, body).into_response()
    }
}

impl From<crate::Error> for AppError {
    fn from(err: crate::Error) -> Self {
        AppError(err)
    }
}

// ---- Response Shell ----

/// Uniform response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: message.into(),
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: message.into(),
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

// ---- Request Types ----

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub auto_continue: bool,
    /// Defaults to the configured `context.max_rounds`
    pub max_steps: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LlmChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    /// Accepted for wire compatibility; the backend's configured sampling
    /// settings are authoritative.
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub clear_history: bool,
}

// ---- Handlers ----

async fn health(State(state): State<AppState>) -> Response {
    if !state.agent.is_initialized() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<Value>::failure("agent not initialized")),
        )
            .into_response();
    }
    Json(ApiResponse::ok(
        serde_json::json!({"status": "healthy", "initialized": true}),
        "service healthy",
    ))
    .into_response()
}

async fn list_tools(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let tools = state.agent.list_tools().await;
    let count = tools.len();
    Json(ApiResponse::ok(
        serde_json::to_value(tools).unwrap_or_default(),
        format!("{} tools available", count),
    ))
}

async fn call_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolCallRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let session_id = state
        .sessions
        .get_or_create(request.session_id.as_deref())
        .await;
    state.sessions.touch(&session_id).await;

    let envelope = state
        .agent
        .execute_tool(&request.tool_name, request.arguments.clone())
        .await?;

    // The call becomes a completed step in the bound session.
    let call = ToolCall::new(&request.tool_name, request.arguments);
    state
        .sessions
        .append_entry(&session_id, HistoryEntry::call(call, envelope.clone()))
        .await;

    Ok(Json(
        ApiResponse::ok(
            serde_json::to_value(envelope).unwrap_or_default(),
            "tool executed",
        )
        .with_session(session_id),
    ))
}

async fn mcp_services(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let rows = state.agent.service_status().await;
    Json(ApiResponse::ok(
        serde_json::to_value(rows).unwrap_or_default(),
        "provider status",
    ))
}

async fn llm_chat(
    State(state): State<AppState>,
    Json(request): Json<LlmChatRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let Some(model) = state.agent.model() else {
        return Err(AppError(crate::Error::Config(
            "no model service configured".to_string(),
        )));
    };

    let response = if request.stream {
        let mut stream = model.generate_stream(&request.prompt).await?;
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&chunk?);
        }
        collected
    } else {
        model.generate(&request.prompt).await?
    };

    Ok(Json(ApiResponse::ok(
        serde_json::json!({"response": response, "stream": request.stream}),
        "chat complete",
    )))
}

async fn execute_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let session_id = state
        .sessions
        .get_or_create(request.session_id.as_deref())
        .await;
    info!("executing command in session {}", session_id);

    let (mut history, _goal) = state.sessions.take_history(&session_id).await;
    let max_steps = request
        .max_steps
        .unwrap_or(state.agent.config().context.max_rounds);
    let interaction = AutoInteraction::new();
    let outcome = state
        .agent
        .execute_interactive(
            &request.command,
            &mut history,
            max_steps,
            request.auto_continue,
            &interaction,
            CancellationToken::new(),
        )
        .await;
    state
        .sessions
        .store_history(&session_id, history, &request.command)
        .await;

    Ok(Json(
        ApiResponse::ok(
            serde_json::to_value(&outcome).unwrap_or_default(),
            "command executed",
        )
        .with_session(session_id),
    ))
}

async fn manage_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Json<ApiResponse<Value>> {
    match request.session_id {
        Some(session_id) => {
            let session_id = state.sessions.get_or_create(Some(&session_id)).await;
            if request.clear_history {
                state.sessions.clear_history(&session_id).await;
            }
            let session = state.sessions.get(&session_id).await;
            Json(
                ApiResponse::ok(
                    serde_json::to_value(session).unwrap_or_default(),
                    "session info",
                )
                .with_session(session_id),
            )
        }
        None => {
            let rows = state.sessions.list().await;
            let count = rows.len();
            Json(ApiResponse::ok(
                serde_json::to_value(rows).unwrap_or_default(),
                format!("{} active sessions", count),
            ))
        }
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    if state.sessions.delete(&session_id).await {
        Json(ApiResponse::ok(
            serde_json::json!({"deleted": session_id}),
            "session deleted",
        ))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<Value>::failure("session not found")),
        )
            .into_response()
    }
}

// ---- Router ----

/// Build the axum application
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/list", get(list_tools))
        .route("/tools/call", post(call_tool))
        .route("/mcp/services", get(mcp_services))
        .route("/llm/chat", post(llm_chat))
        .route("/command/execute", post(execute_command))
        .route("/session/manage", post(manage_session))
        .route("/session/{id}", delete(delete_session))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> crate::Result<()> {
    let app = build_router(state);
    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::Error::Internal(format!("server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProviderServiceConfig};

    async fn test_state() -> AppState {
        let mut config = Config::default();
        config
            .mcp
            .services
            .insert("local".into(), ProviderServiceConfig::default());
        let mut agent = Agent::new(config).unwrap();
        agent.initialize().await.unwrap();
        AppState::new(Arc::new(agent))
    }

    #[tokio::test]
    async fn health_reports_initialized() {
        let state = test_state().await;
        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tools_list_returns_the_catalog() {
        let state = test_state().await;
        let Json(body) = list_tools(State(state)).await;
        assert!(body.success);
        let tools = body.data.unwrap();
        assert!(tools
            .as_array()
            .unwrap()
            .iter()
            .any(|tool| tool["name"] == "sleep"));
    }

    #[tokio::test]
    async fn call_tool_records_into_the_session() {
        let state = test_state().await;
        let response = call_tool(
            State(state.clone()),
            Json(ToolCallRequest {
                tool_name: "sleep".into(),
                arguments: serde_json::json!({"ms": 1}),
                session_id: Some("api-test".into()),
            }),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        assert_eq!(response.0.session_id.as_deref(), Some("api-test"));

        let session = state.sessions.get("api-test").await.unwrap();
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn execute_command_without_model_returns_success_shell() {
        let state = test_state().await;
        let response = execute_command(
            State(state),
            Json(CommandRequest {
                command: "list the tmp directory".into(),
                session_id: None,
                auto_continue: true,
                max_steps: Some(3),
            }),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        let data = response.0.data.unwrap();
        assert_eq!(data["status"], "success");
    }

    #[tokio::test]
    async fn session_lifecycle_over_the_api() {
        let state = test_state().await;
        // Create by reference.
        let Json(info) = manage_session(
            State(state.clone()),
            Json(SessionRequest {
                session_id: Some("lifecycle".into()),
                clear_history: false,
            }),
        )
        .await;
        assert!(info.success);

        // Listed.
        let Json(listing) = manage_session(
            State(state.clone()),
            Json(SessionRequest {
                session_id: None,
                clear_history: false,
            }),
        )
        .await;
        assert_eq!(listing.data.unwrap().as_array().unwrap().len(), 1);

        // Deleted.
        let response =
            delete_session(State(state.clone()), Path("lifecycle".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = delete_session(State(state), Path("lifecycle".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
