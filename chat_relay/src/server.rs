use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::*;

use crate::{ChatRelay, RelayError, WELCOME};

#[derive(Deserialize, Serialize, Debug)]
pub struct ChatPayload {
    pub message: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ChatResponse {
    pub reply: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Internal(cause) => {
                error!("Internal error during chat processing: {}", cause);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(relay: Arc<ChatRelay>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

pub async fn serve(
    listener: TcpListener,
    relay: Arc<ChatRelay>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!("Chat relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME }))
}

async fn chat(
    State(relay): State<Arc<ChatRelay>>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, RelayError> {
    debug!("chat receive: {:?}", payload);
    let reply = relay.process_message(&payload.message).await?;
    Ok(Json(ChatResponse { reply }))
}
