use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::candidate_store::CandidateStore;
use crate::error::Result;
use crate::models::candidate::Candidate;
use crate::models::hr_user::HrUser;
use crate::models::requirement::RoleRequirements;

/// In-process store with the same contract as the Postgres one. Backs tests and dry runs.
#[derive(Default)]
pub struct MemoryCandidateStore {
    candidates: RwLock<BTreeMap<String, Candidate>>,
    requirements: Vec<RoleRequirements>,
    hr_users: Vec<HrUser>,
}

impl MemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requirements(requirements: Vec<RoleRequirements>) -> Self {
        Self {
            candidates: RwLock::new(BTreeMap::new()),
            requirements,
            hr_users: Vec::new(),
        }
    }

    pub fn with_hr_users(mut self, hr_users: Vec<HrUser>) -> Self {
        self.hr_users = hr_users;
        self
    }

    pub async fn len(&self) -> usize {
        self.candidates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.candidates.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Candidate> {
        self.candidates.read().await.values().cloned().collect()
    }

    async fn filter_oldest_first<F>(&self, predicate: F) -> Vec<Candidate>
    where
        F: Fn(&Candidate) -> bool,
    {
        let mut found: Vec<Candidate> = self
            .candidates
            .read()
            .await
            .values()
            .filter(|c| predicate(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.submission_id.cmp(&b.submission_id))
        });
        found
    }
}

#[async_trait]
impl CandidateStore for MemoryCandidateStore {
    async fn find_by_submission_id(&self, submission_id: &str) -> Result<Option<Candidate>> {
        let candidates = self.candidates.read().await;
        if let Some(owner) = candidates.get(submission_id) {
            return Ok(Some(owner.clone()));
        }
        Ok(candidates
            .values()
            .find(|c| c.owns_submission(submission_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Candidate>> {
        let wanted = email.trim().to_lowercase();
        Ok(self
            .filter_oldest_first(|c| {
                c.email
                    .as_deref()
                    .is_some_and(|e| e.trim().to_lowercase() == wanted)
            })
            .await)
    }

    async fn find_by_cpf(&self, cpf: &str) -> Result<Vec<Candidate>> {
        Ok(self
            .filter_oldest_first(|c| c.cpf.as_deref() == Some(cpf))
            .await)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Candidate>> {
        Ok(self
            .filter_oldest_first(|c| c.phone.as_deref() == Some(phone))
            .await)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Candidate>> {
        let mut all = self.filter_oldest_first(|_| true).await;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }

    async fn find_numeric_status(&self) -> Result<Vec<Candidate>> {
        Ok(self.filter_oldest_first(|c| c.status.is_bare_number()).await)
    }

    async fn upsert(&self, candidate: &Candidate) -> Result<Candidate> {
        let mut candidates = self.candidates.write().await;
        let mut stored = candidate.clone();
        if let Some(existing) = candidates.get(&candidate.submission_id) {
            stored.id = existing.id;
            stored.created_at = existing.created_at;
        }
        candidates.insert(stored.submission_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_requirements(&self) -> Result<Vec<RoleRequirements>> {
        Ok(self.requirements.clone())
    }

    async fn list_hr_users(&self) -> Result<Vec<HrUser>> {
        let mut users = self.hr_users.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }
}

/// Reads see an in-memory store; every write fails. Exercises persistence
/// failure paths.
#[cfg(test)]
#[derive(Default)]
pub struct FailingWriteStore {
    pub inner: MemoryCandidateStore,
}

#[cfg(test)]
#[async_trait]
impl CandidateStore for FailingWriteStore {
    async fn find_by_submission_id(&self, submission_id: &str) -> Result<Option<Candidate>> {
        self.inner.find_by_submission_id(submission_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Candidate>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_cpf(&self, cpf: &str) -> Result<Vec<Candidate>> {
        self.inner.find_by_cpf(cpf).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Candidate>> {
        self.inner.find_by_phone(phone).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Candidate>> {
        self.inner.list_recent(limit).await
    }

    async fn find_numeric_status(&self) -> Result<Vec<Candidate>> {
        self.inner.find_numeric_status().await
    }

    async fn upsert(&self, _candidate: &Candidate) -> Result<Candidate> {
        Err(crate::error::Error::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list_requirements(&self) -> Result<Vec<RoleRequirements>> {
        self.inner.list_requirements().await
    }

    async fn list_hr_users(&self) -> Result<Vec<HrUser>> {
        self.inner.list_hr_users().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::CandidateStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn candidate(submission_id: &str, minutes: i64) -> Candidate {
        let base = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Candidate::new(submission_id, None, base + Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn upsert_keeps_identity_of_existing_row() {
        let store = MemoryCandidateStore::new();
        let first = store.upsert(&candidate("s-1", 0)).await.unwrap();

        let mut again = candidate("s-1", 30);
        again.name = "Ana Lima".into();
        let second = store.upsert(&again).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.name, "Ana Lima");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn lookups_are_oldest_first_and_see_linked_submissions() {
        let store = MemoryCandidateStore::new();
        let mut newer = candidate("s-b", 10);
        newer.cpf = Some("12345678901".into());
        let mut older = candidate("s-a", 0);
        older.cpf = Some("12345678901".into());
        older.email = Some("Ana@Example.com".into());
        older.link_submission("s-c");
        store.upsert(&newer).await.unwrap();
        store.upsert(&older).await.unwrap();

        let by_cpf = store.find_by_cpf("12345678901").await.unwrap();
        assert_eq!(by_cpf[0].submission_id, "s-a");
        assert_eq!(by_cpf[1].submission_id, "s-b");

        let linked = store.find_by_submission_id("s-c").await.unwrap().unwrap();
        assert_eq!(linked.submission_id, "s-a");

        let by_email = store.find_by_email(" ana@example.com").await.unwrap();
        assert_eq!(by_email.len(), 1);

        let recent = store.list_recent(1).await.unwrap();
        assert_eq!(recent[0].submission_id, "s-b");
    }

    #[tokio::test]
    async fn numeric_status_scan_returns_only_bare_numbers() {
        let mut legacy = candidate("s-legacy", 0);
        legacy.status = CandidateStatus::parse(" 8 ");
        let mut custom = candidate("s-custom", 1);
        custom.status = CandidateStatus::parse("Aguardando 2a fase");
        let store = MemoryCandidateStore::new();
        for c in [&legacy, &custom, &candidate("s-new", 2)] {
            store.upsert(c).await.unwrap();
        }

        let found = store.find_numeric_status().await.unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.submission_id.as_str()).collect();
        assert_eq!(ids, vec!["s-legacy"]);
    }
}
