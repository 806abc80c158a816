use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::RelayError;

use super::payload::FeedbackRequest;
use super::RelayState;

/// GET /api/health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/feedback
#[instrument(level = "info", skip_all)]
pub async fn submit_feedback(
    State(state): State<RelayState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::info!(error = %rejection.body_text(), "rejected feedback body");
        RelayError::InvalidBody(rejection.body_text())
    })?;

    let feedback = request.validate()?;
    tracing::info!(task = %feedback.task_id, "feedback received");

    let mail = feedback.to_mail(&state.mail);
    if let Err(e) = state.mailer.send(&mail).await {
        tracing::error!(task = %feedback.task_id, error = %e, "failed to send feedback mail");
        return Err(e);
    }

    Ok(Json(json!({ "success": true, "message": "Feedback sent!" })))
}
