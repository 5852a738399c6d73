use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, Json};
use subtle::ConstantTimeEq;

use crate::{
    dto::webhook_dto::{parse_identified_submission, parse_submission},
    error::{Error, Result},
    services::exam_score_service::RecordedScore,
    services::ingestion_service::{IngestOptions, IngestOutcome, IngestReport},
    utils::signature::verify_payload_signature,
    AppState, AuthSettings,
};

pub const SIGNATURE_HEADER: &str = "typeform-signature";
pub const SECRET_HEADER: &str = "x-webhook-secret";

pub async fn handle_form_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestReport>)> {
    verify_delivery(&state.auth, &headers, &body)?;
    let submission = parse_identified_submission(&body)?;
    tracing::info!(
        form_id = %submission.form_id,
        submission_id = submission.submission_id().unwrap_or_default(),
        "Form response received"
    );

    let report = state
        .ingestion_service
        .ingest(&submission, IngestOptions::default())
        .await;
    let status = match report.outcome {
        IngestOutcome::Created => StatusCode::CREATED,
        IngestOutcome::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    Ok((status, Json(report)))
}

pub async fn handle_exam_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RecordedScore>> {
    verify_delivery(&state.auth, &headers, &body)?;
    let submission = parse_submission(&body)?;
    let recorded = state.exam_score_service.record_score(&submission).await?;
    Ok(Json(recorded))
}

/// Accepts the shared-secret header, or the provider HMAC signature when a
/// signing secret is configured.
fn verify_delivery(auth: &AuthSettings, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    if let (Some(secret), Some(signature)) = (
        auth.form_signature_secret.as_deref(),
        headers.get(SIGNATURE_HEADER),
    ) {
        let signature = signature
            .to_str()
            .map_err(|_| Error::Unauthorized("invalid_signature_header".into()))?;
        return if verify_payload_signature(secret, body, signature) {
            Ok(())
        } else {
            tracing::warn!("Webhook signature mismatch");
            Err(Error::Unauthorized("invalid_signature".into()))
        };
    }
    verify_secret(&auth.webhook_secret, headers)
}

fn verify_secret(expected: &str, headers: &HeaderMap) -> Result<()> {
    let Some(secret_hdr) = headers.get(SECRET_HEADER) else {
        return Err(Error::Unauthorized("missing_webhook_secret".into()));
    };
    let provided = secret_hdr
        .to_str()
        .map_err(|_| Error::Unauthorized("invalid_secret_header".into()))?;
    if ConstantTimeEq::ct_eq(provided.as_bytes(), expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(Error::Unauthorized("invalid_webhook_secret".into()))
    }
}
