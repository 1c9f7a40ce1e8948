//! Session endpoints: upload a batch, ask questions, end the session

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{ingest_batch, Upload};
use crate::server::state::AppState;
use crate::types::{AnswerResponse, QuestionRequest, SessionCreated, SkippedFile};

/// POST /api/sessions - Upload files and build the session document
///
/// Files that cannot be read or extracted are reported as skipped; the rest
/// of the batch still makes it into the session.
pub async fn create_session(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionCreated>> {
    let mut uploads = Vec::new();
    let mut unreadable = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        // Plain form fields carry no file
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        match field.bytes().await {
            Ok(data) => {
                tracing::info!(filename = %filename, bytes = data.len(), "Received file");
                uploads.push(Upload {
                    filename,
                    content_type,
                    data,
                });
            }
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Failed to read upload");
                unreadable.push(SkippedFile {
                    filename,
                    reason: format!("Failed to read file: {}", e),
                });
            }
        }
    }

    if uploads.is_empty() && unreadable.is_empty() {
        return Err(Error::InvalidRequest("no files uploaded".to_string()));
    }

    let outcome = ingest_batch(state.registry(), uploads).await;
    let mut skipped = unreadable;
    skipped.extend(outcome.skipped);

    let Some(document) = outcome.document else {
        tracing::warn!(skipped = skipped.len(), "No file in the batch produced text");
        return Ok(Json(SessionCreated {
            session_id: None,
            accepted: outcome.accepted,
            skipped,
            characters: 0,
        }));
    };

    let characters = document.text.chars().count();
    let session_id = state
        .create_session(document, outcome.accepted.clone())
        .await;

    tracing::info!(
        session_id = %session_id,
        files = outcome.accepted.len(),
        skipped = skipped.len(),
        characters,
        "Session created"
    );

    Ok(Json(SessionCreated {
        session_id: Some(session_id),
        accepted: outcome.accepted,
        skipped,
        characters,
    }))
}

/// POST /api/sessions/:id/questions - Answer a question about the session document
pub async fn ask_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>> {
    let session = state
        .session(&id)
        .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
    session.touch();

    tracing::info!(session_id = %id, question = %request.question, "Question");

    let answer = state.pipeline().answer(&session.document, &request.question).await?;
    Ok(Json(answer.into()))
}

/// DELETE /api/sessions/:id - End a session and release its index
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.end_session(&id).await {
        return Err(Error::SessionNotFound(id.to_string()));
    }
    tracing::info!(session_id = %id, "Session ended");

    Ok(StatusCode::NO_CONTENT)
}
