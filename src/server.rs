use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::index::{IndexState, SharedIndex};
use crate::llm::Generator;
use crate::retriever::{RetrievalError, Retriever};

#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
    pub generator: Arc<dyn Generator>,
    pub index: SharedIndex,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub entries: usize,
    pub last_error: Option<String>,
    pub embed_model: String,
    pub text_model: String,
    pub region: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Answers a question. Retrieval is best-effort: a not-ready index only
/// costs the retrieved context, while any other retrieval failure and all
/// generation failures surface as request-level errors.
async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let retrieved = match state.retriever.retrieve_context(&request.prompt).await {
        Ok(context) => context,
        Err(RetrievalError::IndexNotReady { last_error }) => {
            tracing::warn!(?last_error, "answering without retrieved context");
            String::new()
        }
        Err(other) => {
            return Err((
                StatusCode::BAD_GATEWAY,
                format!("retrieval failed: {other}"),
            ));
        }
    };

    // Retrieved context first, then whatever the caller supplied.
    let supplied = request.context.unwrap_or_default();
    let context = [retrieved, supplied]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");

    let answer = state
        .generator
        .generate(&request.prompt, &context)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("generation failed: {e}")))?;

    Ok(Json(QueryResponse { answer }))
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let (ready, entries, last_error) = match &*state.index.read().await {
        IndexState::Building => (false, 0, None),
        IndexState::Ready(index) => (true, index.len(), None),
        IndexState::Failed(err) => (false, 0, Some(err.clone())),
    };

    Json(StatusResponse {
        ready,
        entries,
        last_error,
        embed_model: state.config.embed_model.clone(),
        text_model: state.config.text_model.clone(),
        region: state.config.region.clone(),
    })
}
