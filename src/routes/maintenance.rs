use axum::{extract::State, Json};

use crate::{
    error::{Error, Result},
    services::{candidate_service::RepairSummary, import_service::ImportSummary},
    AppState,
};

/// Runs a full import of the configured forms and returns the run summary.
pub async fn run_import(State(state): State<AppState>) -> Result<Json<ImportSummary>> {
    let Some(import_service) = state.import_service.clone() else {
        return Err(Error::BadRequest(
            "Form provider token is not configured".into(),
        ));
    };
    Ok(Json(import_service.run().await))
}

pub async fn repair_exam_statuses(State(state): State<AppState>) -> Result<Json<RepairSummary>> {
    let summary = state.candidate_service.repair_exam_statuses().await?;
    tracing::info!(
        corrected = summary.corrected,
        manual_review = summary.manual_review.len(),
        "Exam status repair finished"
    );
    Ok(Json(summary))
}
