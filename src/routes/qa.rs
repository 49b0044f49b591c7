//! Negotiation Q&A routes
//!
//! Clarifying questions ride alongside the offer rounds and never consume
//! one. Only the thread's two participants take part; only the counterparty
//! answers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::negotiations::{QaItem, ThreadStatus};
use crate::error::ApiError;
use crate::services::notifications;

#[derive(Debug, sqlx::FromRow)]
struct ThreadParticipants {
    buyer_id: Uuid,
    vendor_id: Uuid,
    status: String,
}

async fn load_participants(
    db: &sqlx::PgPool,
    thread_id: Uuid,
) -> Result<(ThreadParticipants, ThreadStatus), ApiError> {
    let row: Option<ThreadParticipants> = sqlx::query_as(
        "SELECT buyer_id, vendor_id, status FROM negotiation_threads WHERE id = $1",
    )
    .bind(thread_id)
    .fetch_optional(db)
    .await?;
    let row = row.ok_or_else(|| ApiError::not_found("Negotiation not found"))?;
    let status: ThreadStatus = row
        .status
        .parse()
        .map_err(|e: String| ApiError::internal(e))?;
    Ok((row, status))
}

#[derive(Debug, Deserialize)]
pub struct AskQuestionRequest {
    pub asked_by: Uuid,
    pub question: String,
}

/// POST /api/negotiations/:thread_id/questions
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<AskQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::bad_request("Question must not be empty"));
    }

    let (thread, status) = load_participants(&state.db, thread_id).await?;
    if req.asked_by != thread.buyer_id && req.asked_by != thread.vendor_id {
        return Err(ApiError::forbidden(
            "Only negotiation participants may ask questions",
        ));
    }
    if status.is_terminal() {
        return Err(ApiError::conflict(format!(
            "Negotiation is {} and no longer accepts questions",
            status
        )));
    }

    let item: crate::routes::negotiations::QaRow = sqlx::query_as(
        r#"
        INSERT INTO negotiation_qa (thread_id, asked_by, question)
        VALUES ($1, $2, $3)
        RETURNING id, thread_id, asked_by, question, answer, answered_by, answered_at, created_at
        "#,
    )
    .bind(thread_id)
    .bind(req.asked_by)
    .bind(req.question.trim())
    .fetch_one(&state.db)
    .await?;
    let item = QaItem::from(item);

    tracing::info!(
        thread_id = %thread_id,
        qa_id = %item.id,
        asked_by = %req.asked_by,
        "Question asked"
    );

    let counterparty = if req.asked_by == thread.buyer_id {
        thread.vendor_id
    } else {
        thread.buyer_id
    };
    notifications::notify_qa_question(state.sink.as_ref(), counterparty, thread_id, item.id).await;

    Ok(DataResponse::new(item))
}

#[derive(Debug, Deserialize)]
pub struct AnswerQuestionRequest {
    pub answered_by: Uuid,
    pub answer: String,
}

/// PUT /api/negotiations/:thread_id/questions/:qa_id/answer
pub async fn answer_question(
    State(state): State<Arc<AppState>>,
    Path((thread_id, qa_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AnswerQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.answer.trim().is_empty() {
        return Err(ApiError::bad_request("Answer must not be empty"));
    }

    let (thread, _status) = load_participants(&state.db, thread_id).await?;
    if req.answered_by != thread.buyer_id && req.answered_by != thread.vendor_id {
        return Err(ApiError::forbidden(
            "Only negotiation participants may answer questions",
        ));
    }

    #[derive(sqlx::FromRow)]
    struct QuestionState {
        asked_by: Uuid,
        answer: Option<String>,
    }
    let question: Option<QuestionState> = sqlx::query_as(
        "SELECT asked_by, answer FROM negotiation_qa WHERE id = $1 AND thread_id = $2",
    )
    .bind(qa_id)
    .bind(thread_id)
    .fetch_optional(&state.db)
    .await?;
    let question = question.ok_or_else(|| ApiError::not_found("Question not found"))?;

    if question.asked_by == req.answered_by {
        return Err(ApiError::forbidden("A question cannot be answered by its asker"));
    }
    if question.answer.is_some() {
        return Err(ApiError::conflict("Question is already answered"));
    }

    let now = Utc::now();
    let item: crate::routes::negotiations::QaRow = sqlx::query_as(
        r#"
        UPDATE negotiation_qa
        SET answer = $3, answered_by = $4, answered_at = $5
        WHERE id = $1 AND thread_id = $2
        RETURNING id, thread_id, asked_by, question, answer, answered_by, answered_at, created_at
        "#,
    )
    .bind(qa_id)
    .bind(thread_id)
    .bind(req.answer.trim())
    .bind(req.answered_by)
    .bind(now)
    .fetch_one(&state.db)
    .await?;
    let item = QaItem::from(item);

    tracing::info!(
        thread_id = %thread_id,
        qa_id = %qa_id,
        answered_by = %req.answered_by,
        "Question answered"
    );

    notifications::notify_qa_answer(state.sink.as_ref(), question.asked_by, thread_id, qa_id).await;

    Ok(DataResponse::new(item))
}
