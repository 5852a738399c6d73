use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::candidate::{
    Candidate, PhaseWindow, StatusEntry, StructuredProfile, SuitabilityAnalysis,
};
use crate::models::hr_user::HrUser;
use crate::models::requirement::RoleRequirements;
use crate::utils::timeout::with_timeout;

/// Canonical candidate store. Every mutation of candidate state goes through
/// [`CandidateStore::upsert`], keyed by `submission_id`.
///
/// Multi-row lookups return records oldest first (`created_at`, then
/// `submission_id`) so callers can break ties deterministically.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Record created by, or linked to, this submission.
    async fn find_by_submission_id(&self, submission_id: &str) -> Result<Option<Candidate>>;

    async fn find_by_email(&self, email: &str) -> Result<Vec<Candidate>>;

    /// `cpf` must already be digit-normalized.
    async fn find_by_cpf(&self, cpf: &str) -> Result<Vec<Candidate>>;

    /// `phone` must already be digit-normalized.
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Candidate>>;

    /// Most recently created records first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Candidate>>;

    /// Records whose status column holds only digits (legacy exam scores).
    async fn find_numeric_status(&self) -> Result<Vec<Candidate>>;

    /// Insert or overwrite the record with the same `submission_id`, all or nothing.
    /// `id` and `created_at` of an existing row are preserved.
    async fn upsert(&self, candidate: &Candidate) -> Result<Candidate>;

    async fn list_requirements(&self) -> Result<Vec<RoleRequirements>>;

    /// Recruiter accounts, ordered by name.
    async fn list_hr_users(&self) -> Result<Vec<HrUser>>;
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    submission_id: String,
    linked_submission_ids: Vec<String>,
    form_id: Option<String>,
    name: String,
    cpf: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    birth_date: Option<NaiveDate>,
    resume_url: Option<String>,
    profile: Option<Json<StructuredProfile>>,
    analysis: Option<Json<SuitabilityAnalysis>>,
    exam_scores: Json<BTreeMap<String, f64>>,
    status: String,
    status_history: Json<Vec<StatusEntry>>,
    phases: Json<BTreeMap<String, PhaseWindow>>,
    raw_data: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Self {
            id: row.id,
            submission_id: row.submission_id,
            linked_submission_ids: row.linked_submission_ids,
            form_id: row.form_id,
            name: row.name,
            cpf: row.cpf,
            phone: row.phone,
            email: row.email,
            birth_date: row.birth_date,
            resume_url: row.resume_url,
            profile: row.profile.map(|p| p.0),
            analysis: row.analysis.map(|a| a.0),
            exam_scores: row.exam_scores.0,
            status: row.status.into(),
            status_history: row.status_history.0,
            phases: row.phases.0,
            raw_data: row.raw_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CANDIDATE_COLUMNS: &str = "id, submission_id, linked_submission_ids, form_id, name, cpf, \
    phone, email, birth_date, resume_url, profile, analysis, exam_scores, status, \
    status_history, phases, raw_data, created_at, updated_at";

#[derive(Clone)]
pub struct PgCandidateStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn fetch_where(&self, what: &str, predicate: &str, value: &str) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE {} ORDER BY created_at ASC, submission_id ASC",
            CANDIDATE_COLUMNS, predicate
        );
        let rows = with_timeout(
            self.timeout,
            what,
            sqlx::query_as::<_, CandidateRow>(&sql)
                .bind(value)
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn find_by_submission_id(&self, submission_id: &str) -> Result<Option<Candidate>> {
        let mut rows = self
            .fetch_where(
                "find by submission id",
                "submission_id = $1 OR $1 = ANY(linked_submission_ids)",
                submission_id,
            )
            .await?;
        // The owning row wins over a row that merely links the submission.
        rows.sort_by_key(|c| c.submission_id != submission_id);
        Ok(rows.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Candidate>> {
        self.fetch_where("find by email", "LOWER(email) = LOWER($1)", email.trim())
            .await
    }

    async fn find_by_cpf(&self, cpf: &str) -> Result<Vec<Candidate>> {
        self.fetch_where("find by cpf", "cpf = $1", cpf).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Candidate>> {
        self.fetch_where("find by phone", "phone = $1", phone).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates ORDER BY created_at DESC, submission_id DESC LIMIT $1",
            CANDIDATE_COLUMNS
        );
        let rows = with_timeout(
            self.timeout,
            "list recent candidates",
            sqlx::query_as::<_, CandidateRow>(&sql)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn find_numeric_status(&self) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE BTRIM(status) ~ '^[0-9]+$' \
             ORDER BY created_at ASC, submission_id ASC",
            CANDIDATE_COLUMNS
        );
        let rows = with_timeout(
            self.timeout,
            "find numeric statuses",
            sqlx::query_as::<_, CandidateRow>(&sql).fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn upsert(&self, candidate: &Candidate) -> Result<Candidate> {
        let sql = format!(
            r#"
            INSERT INTO candidates ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (submission_id) DO UPDATE SET
                linked_submission_ids = EXCLUDED.linked_submission_ids,
                form_id = EXCLUDED.form_id,
                name = EXCLUDED.name,
                cpf = EXCLUDED.cpf,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                birth_date = EXCLUDED.birth_date,
                resume_url = EXCLUDED.resume_url,
                profile = EXCLUDED.profile,
                analysis = EXCLUDED.analysis,
                exam_scores = EXCLUDED.exam_scores,
                status = EXCLUDED.status,
                status_history = EXCLUDED.status_history,
                phases = EXCLUDED.phases,
                raw_data = EXCLUDED.raw_data,
                updated_at = EXCLUDED.updated_at
            RETURNING {cols}
            "#,
            cols = CANDIDATE_COLUMNS
        );
        let row = with_timeout(
            self.timeout,
            "upsert candidate",
            sqlx::query_as::<_, CandidateRow>(&sql)
                .bind(candidate.id)
                .bind(&candidate.submission_id)
                .bind(&candidate.linked_submission_ids)
                .bind(&candidate.form_id)
                .bind(&candidate.name)
                .bind(&candidate.cpf)
                .bind(&candidate.phone)
                .bind(&candidate.email)
                .bind(candidate.birth_date)
                .bind(&candidate.resume_url)
                .bind(candidate.profile.as_ref().map(Json))
                .bind(candidate.analysis.as_ref().map(Json))
                .bind(Json(&candidate.exam_scores))
                .bind(candidate.status.as_str())
                .bind(Json(&candidate.status_history))
                .bind(Json(&candidate.phases))
                .bind(&candidate.raw_data)
                .bind(candidate.created_at)
                .bind(candidate.updated_at)
                .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.into())
    }

    async fn list_requirements(&self) -> Result<Vec<RoleRequirements>> {
        let rows = with_timeout(
            self.timeout,
            "list role requirements",
            sqlx::query_as::<_, RoleRequirements>(
                r#"SELECT id, role_name, requirements, differentials, locations, created_at
                   FROM role_requirements ORDER BY id ASC"#,
            )
            .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows)
    }

    async fn list_hr_users(&self) -> Result<Vec<HrUser>> {
        let rows = with_timeout(
            self.timeout,
            "list hr users",
            sqlx::query_as::<_, HrUser>(
                "SELECT id, name, email, role, image_url FROM hr_users ORDER BY name ASC",
            )
            .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows)
    }
}
