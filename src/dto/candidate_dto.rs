use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::candidate::Candidate;
use crate::services::candidate_service::StatusChange;
use crate::utils::time::today;

pub const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListCandidatesQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

impl ListCandidatesQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    /// Board label such as `Reprovado`, or an English name.
    #[validate(length(min = 1, max = 64))]
    pub status: String,
}

/// Candidate as served to the board. Age is derived on every read.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResponse {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub age: Option<u32>,
    pub has_resume: bool,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        let age = candidate.age(today());
        let has_resume = candidate
            .resume_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        Self {
            candidate,
            age,
            has_resume,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResponse {
    pub candidate: CandidateResponse,
    pub changed: bool,
    pub notified: bool,
}

impl From<StatusChange> for StatusChangeResponse {
    fn from(change: StatusChange) -> Self {
        Self {
            candidate: change.candidate.into(),
            changed: change.changed,
            notified: change.notified,
        }
    }
}
