//! Stateless question endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{AnswerRequest, AnswerResponse};

/// POST /api/answer - Answer a question about inline document text
pub async fn answer_question(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    tracing::info!(
        characters = request.document_text.len(),
        question = %request.question,
        "Inline question"
    );

    let answer = state
        .pipeline()
        .answer_question(&request.document_text, &request.question)
        .await?;

    Ok(Json(answer.into()))
}
