// http server mode - run smartql as an api

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::core::{AskOptions, SmartAnswer, SmartChat, Usage};
use crate::{Error, Settings};

struct AppState {
    chat: SmartChat,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

impl ChatRequest {
    fn options(&self) -> AskOptions {
        AskOptions {
            model: self.model.clone().filter(|m| !m.is_empty()),
            max_tokens: self.max_tokens.filter(|n| *n > 0),
            order_by: None,
        }
    }
}

#[derive(Serialize)]
struct ChatResponse {
    message: String,
    model: String,
    usage: Usage,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    data: T,
    message: &'static str,
}

#[derive(Serialize)]
struct Failure {
    error: bool,
    message: String,
    code: u16,
}

// every failure leaves as the same envelope
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        error!(error = %e, "request failed");
        Self {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Failure {
            error: true,
            message: self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub struct Server;

impl Server {
    pub async fn run(settings: Settings, host: &str, port: u16) -> Result<(), Error> {
        let app = Self::router(settings.smart_chat());

        let addr = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        info!("server running at http://{addr}");

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        Ok(())
    }

    /// Routes without a listener, so tests can drive them directly.
    pub fn router(chat: SmartChat) -> Router {
        let state = Arc::new(AppState { chat });

        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/api/v1/chat", post(chat_handler))
            .route("/api/v1/smart-chat", post(smart_chat))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "smartql api running" }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    req: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Success<ChatResponse>>, ApiError> {
    let Json(req) = req?;

    let completion = state.chat.chat(&req.message, &req.options()).await?;

    Ok(Json(Success {
        success: true,
        data: ChatResponse {
            message: completion.text,
            model: completion.model,
            usage: completion.usage,
            created_at: Utc::now(),
        },
        message: "Chat response generated successfully",
    }))
}

// a dropped connection drops this future, which cancels the in-flight call
async fn smart_chat(
    State(state): State<Arc<AppState>>,
    req: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Success<SmartAnswer>>, ApiError> {
    let Json(req) = req?;

    let answer = state.chat.answer(&req.message, &req.options()).await?;

    Ok(Json(Success {
        success: true,
        data: answer,
        message: "Smart chat response generated successfully",
    }))
}
