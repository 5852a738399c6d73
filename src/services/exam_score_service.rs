use std::sync::Arc;

use serde::Serialize;

use crate::database::CandidateStore;
use crate::error::{Error, Result};
use crate::models::submission::Submission;
use crate::services::field_extractor::{ExtractedFields, FieldAliasMap, SchemaKind};
use crate::services::resolver::{CandidateResolver, MatchedBy};
use crate::utils::time::now;

/// Variable carrying the quiz result on exam form responses.
pub const SCORE_VARIABLE: &str = "quiz_score";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedScore {
    pub submission_id: String,
    pub name: String,
    pub form_id: String,
    pub score: f64,
    pub matched_by: MatchedBy,
}

/// Attaches exam results to existing candidates. Status is left as is.
pub struct ExamScoreService {
    store: Arc<dyn CandidateStore>,
    alias_map: Arc<FieldAliasMap>,
    resolver: CandidateResolver,
}

impl ExamScoreService {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        alias_map: Arc<FieldAliasMap>,
        resolver: CandidateResolver,
    ) -> Self {
        Self {
            store,
            alias_map,
            resolver,
        }
    }

    pub async fn record_score(&self, submission: &Submission) -> Result<RecordedScore> {
        let form_id = submission.form_id.as_str();
        if self.alias_map.schema_kind(form_id) != Some(SchemaKind::Exam) {
            return Err(Error::BadRequest(format!("Unknown exam form: {}", form_id)));
        }

        let fields = ExtractedFields::from_submission(&self.alias_map, submission);
        if fields.name.is_none() && fields.cpf.is_none() {
            return Err(Error::BadRequest(
                "Neither name nor CPF found in exam response".to_string(),
            ));
        }
        let score = submission
            .variable_number(SCORE_VARIABLE)
            .ok_or_else(|| Error::BadRequest("Score not found in exam response".to_string()))?;

        // The exam response id is not a candidate key.
        let ids = fields.identifiers(None);
        let resolution = self
            .resolver
            .resolve(self.store.as_ref(), &ids)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found by name or CPF".to_string()))?;

        let mut candidate = resolution.candidate;
        candidate.exam_scores.insert(form_id.to_string(), score);
        candidate.updated_at = now();
        let saved = self.store.upsert(&candidate).await?;

        tracing::info!(
            submission_id = %saved.submission_id,
            form_id,
            score,
            matched_by = resolution.matched_by.as_str(),
            "Exam score recorded"
        );
        Ok(RecordedScore {
            submission_id: saved.submission_id,
            name: saved.name,
            form_id: form_id.to_string(),
            score,
            matched_by: resolution.matched_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCandidateStore;
    use crate::models::candidate::Candidate;
    use crate::models::status::CandidateStatus;
    use chrono::Utc;
    use serde_json::json;

    fn service(store: Arc<MemoryCandidateStore>) -> ExamScoreService {
        ExamScoreService::new(store, Arc::new(FieldAliasMap::builtin()), CandidateResolver::new(50))
    }

    fn exam(form_id: &str, answers: serde_json::Value, score: Option<f64>) -> Submission {
        let variables = match score {
            Some(score) => json!([{ "key": "quiz_score", "type": "number", "number": score }]),
            None => json!([]),
        };
        serde_json::from_value(json!({
            "form_id": form_id,
            "token": "exam-token",
            "answers": answers,
            "variables": variables
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn stores_score_by_form_and_keeps_status() {
        let store = Arc::new(MemoryCandidateStore::new());
        let mut c = Candidate::new("app-1", None, Utc::now());
        c.name = "Ana Lima".into();
        c.cpf = Some("12345678901".into());
        c.transition_to(CandidateStatus::Exams, Utc::now());
        store.upsert(&c).await.unwrap();

        let recorded = service(store.clone())
            .record_score(&exam(
                "Z59Mv1sY",
                json!([
                    { "field": { "id": "cPBR2RtoMRBN" }, "type": "text", "text": "Ana Lima" },
                    { "field": { "id": "ZwvjaHmu1l0b" }, "type": "text", "text": "123.456.789-01" }
                ]),
                Some(8.0),
            ))
            .await
            .unwrap();
        assert_eq!(recorded.submission_id, "app-1");
        assert_eq!(recorded.matched_by, MatchedBy::Cpf);

        let stored = store.find_by_submission_id("app-1").await.unwrap().unwrap();
        assert_eq!(stored.exam_scores.get("Z59Mv1sY"), Some(&8.0));
        assert_eq!(stored.status, CandidateStatus::Exams);
        assert_eq!(stored.status_history.len(), 2);
    }

    #[tokio::test]
    async fn rejects_unknown_forms_and_incomplete_payloads() {
        let store = Arc::new(MemoryCandidateStore::new());
        let service = service(store);
        let name_only = json!([{ "field": { "id": "syzxhm3Z3iGG" }, "type": "text", "text": "Ana" }]);

        let err = service.record_score(&exam("ynFUyrAc", name_only.clone(), Some(5.0))).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = service.record_score(&exam("OrKerl6D", json!([]), Some(5.0))).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = service.record_score(&exam("OrKerl6D", name_only.clone(), None)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = service.record_score(&exam("OrKerl6D", name_only, Some(5.0))).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
