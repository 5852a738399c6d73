use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::submission::Submission;

/// Provider envelope. Some senders post the response object bare, so the
/// wrapper is optional.
#[derive(Debug, Deserialize)]
struct FormResponseEnvelope {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    form_response: Submission,
}

/// Parses a webhook body into a submission, unwrapping `form_response` when
/// present.
pub fn parse_submission(body: &[u8]) -> Result<Submission> {
    let value: JsonValue = serde_json::from_slice(body)?;
    if value.get("form_response").is_some() {
        let envelope: FormResponseEnvelope = serde_json::from_value(value)?;
        tracing::debug!(
            event_id = envelope.event_id.as_deref().unwrap_or_default(),
            event_type = envelope.event_type.as_deref().unwrap_or_default(),
            "Unwrapped form_response envelope"
        );
        return Ok(envelope.form_response);
    }
    if !value.is_object() {
        return Err(Error::BadRequest("Webhook body must be a JSON object".into()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Like [`parse_submission`] but also requires an idempotency key.
pub fn parse_identified_submission(body: &[u8]) -> Result<Submission> {
    let submission = parse_submission(body)?;
    if submission.submission_id().is_none() {
        return Err(Error::BadRequest(
            "Submission has neither response_id nor token".into(),
        ));
    }
    Ok(submission)
}
