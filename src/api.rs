use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::app_state::AppState;

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct ChatPayload {
    message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    answer: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/chat", post(chat_handler))
        // Sin límite de tamaño: un `message` muy largo se pasa tal cual.
        .layer(DefaultBodyLimit::disable())
        .with_state(app_state)
}

// --- Handlers ---

/// Sólo indica que el proceso está vivo; no consulta Pinecone ni Gemini.
#[axum::debug_handler]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Backend is running",
    })
}

/// Un cuerpo ausente, que no sea JSON o sin `message` es un 400 y no llega
/// a tocar el retriever ni el LLM.
#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    payload: Option<Json<ChatPayload>>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Message is required"})),
        ));
    };

    info!("Usuario: {}", payload.message);

    match state.rag.answer(&payload.message).await {
        Ok(answer) => {
            info!("Bot: {}", answer);
            Ok(Json(ChatResponse { answer }))
        }
        Err(e) => {
            error!("Error al procesar la consulta RAG: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            ))
        }
    }
}
