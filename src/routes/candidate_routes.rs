use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::{
    dto::candidate_dto::{
        CandidateResponse, ListCandidatesQuery, StatusChangeResponse, UpdateStatusRequest,
    },
    error::Result,
    models::status::CandidateStatus,
    AppState,
};

pub async fn list_candidates(
    State(state): State<AppState>,
    Query(query): Query<ListCandidatesQuery>,
) -> Result<Json<Vec<CandidateResponse>>> {
    query.validate()?;
    let candidates = state.candidate_service.list(query.limit()).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

pub async fn get_candidate(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<CandidateResponse>> {
    let candidate = state.candidate_service.get(&submission_id).await?;
    Ok(Json(candidate.into()))
}

pub async fn update_candidate_status(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<StatusChangeResponse>> {
    payload.validate()?;
    let status = CandidateStatus::parse(&payload.status);
    let change = state
        .candidate_service
        .update_status(&submission_id, status)
        .await?;
    Ok(Json(change.into()))
}
