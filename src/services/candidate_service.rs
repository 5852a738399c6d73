use std::sync::Arc;

use serde::Serialize;

use crate::database::CandidateStore;
use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::models::status::CandidateStatus;
use crate::services::notification_service::{transition_message, Notifier};
use crate::utils::normalize::normalize_phone_e164;
use crate::utils::time::now;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub candidate: Candidate,
    /// `false` when the status was already the last recorded one.
    pub changed: bool,
    pub notified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairSummary {
    pub corrected: usize,
    pub manual_review: Vec<String>,
}

pub struct CandidateService {
    store: Arc<dyn CandidateStore>,
    notifier: Arc<dyn Notifier>,
    default_country_code: String,
}

impl CandidateService {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        notifier: Arc<dyn Notifier>,
        default_country_code: String,
    ) -> Self {
        Self {
            store,
            notifier,
            default_country_code,
        }
    }

    pub async fn get(&self, submission_id: &str) -> Result<Candidate> {
        self.store
            .find_by_submission_id(submission_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", submission_id)))
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Candidate>> {
        self.store.list_recent(limit).await
    }

    /// Moves a candidate to `status`.
    ///
    /// Nothing is written and nobody is contacted when the status is already
    /// the last recorded one. The message, if any, goes out only after the
    /// new status has been stored.
    pub async fn update_status(&self, submission_id: &str, status: CandidateStatus) -> Result<StatusChange> {
        let mut candidate = self.get(submission_id).await?;
        if !candidate.transition_to(status.clone(), now()) {
            tracing::info!(submission_id, status = %status, "Status unchanged");
            return Ok(StatusChange {
                candidate,
                changed: false,
                notified: false,
            });
        }

        let saved = self.store.upsert(&candidate).await?;
        tracing::info!(submission_id, status = %status, "Status updated");

        let notified = self.notify_transition(&saved);
        Ok(StatusChange {
            candidate: saved,
            changed: true,
            notified,
        })
    }

    fn notify_transition(&self, candidate: &Candidate) -> bool {
        let first_name = if candidate.has_placeholder_name() {
            "Candidato"
        } else {
            candidate.first_name()
        };
        let Some(message) = transition_message(&candidate.status, first_name) else {
            return false;
        };

        let raw_phone = candidate.phone.as_deref().or_else(|| {
            candidate
                .profile
                .as_ref()
                .and_then(|p| p.personal.phone.as_deref())
        });
        let Some(phone) = raw_phone.and_then(|p| normalize_phone_e164(p, &self.default_country_code)) else {
            tracing::warn!(
                submission_id = %candidate.submission_id,
                "No phone number, transition message not sent"
            );
            return false;
        };

        self.notifier.send(&phone, &message);
        true
    }

    /// Fixes records whose status column holds a bare exam score. Those with
    /// recorded scores move to `Provas`; the rest are listed for a human.
    pub async fn repair_exam_statuses(&self) -> Result<RepairSummary> {
        let mut summary = RepairSummary::default();
        for mut candidate in self.store.find_numeric_status().await? {
            if candidate.exam_scores.is_empty() {
                tracing::warn!(
                    submission_id = %candidate.submission_id,
                    status = %candidate.status,
                    "Numeric status without exam scores needs manual review"
                );
                summary.manual_review.push(candidate.submission_id);
                continue;
            }

            let at = now();
            if !candidate.transition_to(CandidateStatus::Exams, at) {
                candidate.status = CandidateStatus::Exams;
                candidate.updated_at = at;
            }
            self.store.upsert(&candidate).await?;
            tracing::info!(submission_id = %candidate.submission_id, "Numeric status moved to exams");
            summary.corrected += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCandidateStore;
    use crate::services::notification_service::MockNotifier;
    use chrono::Utc;

    async fn seeded(store: &MemoryCandidateStore, phone: Option<&str>) {
        let mut c = Candidate::new("s-1", None, Utc::now());
        c.name = "Ana Lima".into();
        c.phone = phone.map(str::to_string);
        store.upsert(&c).await.unwrap();
    }

    fn service(store: Arc<MemoryCandidateStore>, notifier: MockNotifier) -> CandidateService {
        CandidateService::new(store, Arc::new(notifier), "55".into())
    }

    #[tokio::test]
    async fn rejection_notifies_once_with_e164_phone() {
        let store = Arc::new(MemoryCandidateStore::new());
        seeded(&store, Some("(67) 99299-2381")).await;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|phone, message| {
                phone.to_string() == "+5567992992381" && message.starts_with("Olá, Ana!")
            })
            .times(1)
            .return_const(());
        let service = service(store.clone(), notifier);

        let first = service.update_status("s-1", CandidateStatus::Rejected).await.unwrap();
        assert!(first.changed && first.notified);
        assert_eq!(first.candidate.status_history.len(), 2);

        let again = service.update_status("s-1", CandidateStatus::Rejected).await.unwrap();
        assert!(!again.changed && !again.notified);
        assert_eq!(again.candidate.status_history.len(), 2);
    }

    #[tokio::test]
    async fn silent_statuses_and_missing_phone_do_not_notify() {
        let store = Arc::new(MemoryCandidateStore::new());
        seeded(&store, None).await;

        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();
        let service = service(store.clone(), notifier);

        let approved = service.update_status("s-1", CandidateStatus::Approved).await.unwrap();
        assert!(approved.changed && !approved.notified);
        let interview = service.update_status("s-1", CandidateStatus::Interview).await.unwrap();
        assert!(interview.changed && !interview.notified);
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let store = Arc::new(MemoryCandidateStore::new());
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();
        let err = service(store, notifier)
            .update_status("missing", CandidateStatus::Exams)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn repair_moves_scored_numeric_statuses_to_exams() {
        let store = Arc::new(MemoryCandidateStore::new());
        let mut scored = Candidate::new("scored", None, Utc::now());
        scored.status = CandidateStatus::parse("7");
        scored.exam_scores.insert("OrKerl6D".into(), 7.0);
        let mut unscored = Candidate::new("unscored", None, Utc::now());
        unscored.status = CandidateStatus::parse("3");
        store.upsert(&scored).await.unwrap();
        store.upsert(&unscored).await.unwrap();

        let summary = service(store.clone(), MockNotifier::new())
            .repair_exam_statuses()
            .await
            .unwrap();
        assert_eq!(summary.corrected, 1);
        assert_eq!(summary.manual_review, vec!["unscored"]);

        let fixed = store.find_by_submission_id("scored").await.unwrap().unwrap();
        assert_eq!(fixed.status, CandidateStatus::Exams);
    }
}
