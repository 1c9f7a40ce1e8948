//! API routes for the question-answering server

pub mod answer;
pub mod sessions;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Sessions - larger body limit for multipart uploads
        .route(
            "/sessions",
            post(sessions::create_session).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/sessions/:id", delete(sessions::delete_session))
        .route("/sessions/:id/questions", post(sessions::ask_question))
        // Stateless question against inline text
        .route("/answer", post(answer::answer_question))
        .route("/info", axum::routing::get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    let pipeline = state.pipeline();

    Json(serde_json::json!({
        "name": "talkdata",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document question answering with source citations",
        "backend": config.backend,
        "models": {
            "chat": pipeline.composer().llm().model(),
            "embedding": config.llm.embed_model,
            "embedder": pipeline.retriever().embedder().name(),
        },
        "chunking": {
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap,
        },
        "top_k": config.retrieval.top_k,
        "sessions": state.session_count(),
        "index_cache": pipeline.retriever().cache_stats(),
        "endpoints": {
            "POST /api/sessions": "Upload files (multipart) and open a session",
            "POST /api/sessions/:id/questions": "Ask a question about a session's documents",
            "DELETE /api/sessions/:id": "End a session",
            "POST /api/answer": "Ask a question about inline document text"
        }
    }))
}
