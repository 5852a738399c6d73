use serde::Serialize;

use crate::database::CandidateStore;
use crate::error::Result;
use crate::models::candidate::Candidate;
use crate::services::name_matcher::names_match;
use crate::utils::normalize::digits_or_none;

/// Partial identity of an inbound submission or score callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Identifiers {
    pub submission_id: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

impl Identifiers {
    fn cpf_digits(&self) -> Option<String> {
        digits_or_none(self.cpf.as_deref())
    }

    fn phone_digits(&self) -> Option<String> {
        digits_or_none(self.phone.as_deref())
    }

    fn email_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }

    fn name_key(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    SubmissionId,
    Email,
    Cpf,
    Phone,
    Name,
}

impl MatchedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchedBy::SubmissionId => "submission_id",
            MatchedBy::Email => "email",
            MatchedBy::Cpf => "cpf",
            MatchedBy::Phone => "phone",
            MatchedBy::Name => "name",
        }
    }
}

/// Priority order of the matchers. Later ones are not consulted once an
/// earlier one yields a candidate.
pub const RESOLUTION_ORDER: [MatchedBy; 5] = [
    MatchedBy::SubmissionId,
    MatchedBy::Email,
    MatchedBy::Cpf,
    MatchedBy::Phone,
    MatchedBy::Name,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ambiguity {
    /// Several records share the CPF; the one whose name matched was chosen.
    CpfNameTieBreak { candidates: usize },
    /// Several records share the CPF and none matched by name; the oldest was chosen.
    CpfFirstByCreation { candidates: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub candidate: Candidate,
    pub matched_by: MatchedBy,
    pub ambiguity: Option<Ambiguity>,
}

/// Pure matcher: picks at most one candidate out of `pool` for one strategy.
/// `pool` is expected in oldest-first order for every strategy except
/// [`MatchedBy::Name`], where it is most-recent-first.
pub fn select(strategy: MatchedBy, ids: &Identifiers, pool: Vec<Candidate>) -> Option<Resolution> {
    match strategy {
        MatchedBy::Cpf => select_by_cpf(ids, pool),
        MatchedBy::Name => {
            let name = ids.name_key()?;
            pool.into_iter()
                .find(|c| !c.has_placeholder_name() && names_match(&c.name, name))
                .map(|candidate| Resolution {
                    candidate,
                    matched_by: MatchedBy::Name,
                    ambiguity: None,
                })
        }
        exact => pool.into_iter().next().map(|candidate| Resolution {
            candidate,
            matched_by: exact,
            ambiguity: None,
        }),
    }
}

fn select_by_cpf(ids: &Identifiers, pool: Vec<Candidate>) -> Option<Resolution> {
    let total = pool.len();
    if total <= 1 {
        return pool.into_iter().next().map(|candidate| Resolution {
            candidate,
            matched_by: MatchedBy::Cpf,
            ambiguity: None,
        });
    }

    let by_name = ids
        .name_key()
        .and_then(|name| pool.iter().position(|c| names_match(&c.name, name)));

    let (index, ambiguity) = match by_name {
        Some(index) => (index, Ambiguity::CpfNameTieBreak { candidates: total }),
        None => (0, Ambiguity::CpfFirstByCreation { candidates: total }),
    };
    pool.into_iter().nth(index).map(|candidate| Resolution {
        candidate,
        matched_by: MatchedBy::Cpf,
        ambiguity: Some(ambiguity),
    })
}

fn cpf_conflicts(ids: &Identifiers, candidate: &Candidate) -> bool {
    match (ids.cpf_digits(), digits_or_none(candidate.cpf.as_deref())) {
        (Some(inbound), Some(stored)) => inbound != stored,
        _ => false,
    }
}

/// Chain of matchers over the canonical store.
#[derive(Debug, Clone)]
pub struct CandidateResolver {
    name_scan_limit: usize,
}

impl CandidateResolver {
    pub fn new(name_scan_limit: usize) -> Self {
        Self { name_scan_limit }
    }

    async fn fetch_pool(
        &self,
        store: &dyn CandidateStore,
        strategy: MatchedBy,
        ids: &Identifiers,
    ) -> Result<Vec<Candidate>> {
        let pool = match strategy {
            MatchedBy::SubmissionId => match ids.submission_id.as_deref() {
                Some(id) => store.find_by_submission_id(id).await?.into_iter().collect(),
                None => Vec::new(),
            },
            MatchedBy::Email => match ids.email_key() {
                Some(email) => store.find_by_email(&email).await?,
                None => Vec::new(),
            },
            MatchedBy::Cpf => match ids.cpf_digits() {
                Some(cpf) => store.find_by_cpf(&cpf).await?,
                None => Vec::new(),
            },
            MatchedBy::Phone => match ids.phone_digits() {
                Some(phone) => store.find_by_phone(&phone).await?,
                None => Vec::new(),
            },
            MatchedBy::Name => match ids.name_key() {
                Some(_) => store.list_recent(self.name_scan_limit).await?,
                None => Vec::new(),
            },
        };
        Ok(pool)
    }

    /// First match in [`RESOLUTION_ORDER`], or `None`.
    ///
    /// A match by email, phone or name whose stored CPF differs from a
    /// non-empty inbound CPF is a different person; resolution then reports
    /// `None` rather than consulting weaker matchers.
    pub async fn resolve(
        &self,
        store: &dyn CandidateStore,
        ids: &Identifiers,
    ) -> Result<Option<Resolution>> {
        for strategy in RESOLUTION_ORDER {
            let pool = self.fetch_pool(store, strategy, ids).await?;
            let scanned = pool.len();
            let Some(resolution) = select(strategy, ids, pool) else {
                continue;
            };

            let candidate = &resolution.candidate;
            if matches!(strategy, MatchedBy::Email | MatchedBy::Phone | MatchedBy::Name)
                && cpf_conflicts(ids, candidate)
            {
                tracing::warn!(
                    submission_id = ?ids.submission_id,
                    existing_submission_id = %candidate.submission_id,
                    matched_by = strategy.as_str(),
                    "Match rejected because the CPF differs"
                );
                return Ok(None);
            }

            match (&resolution.ambiguity, strategy) {
                (Some(ambiguity), _) => tracing::warn!(
                    submission_id = ?ids.submission_id,
                    chosen = %candidate.submission_id,
                    ?ambiguity,
                    "Several candidates share the CPF"
                ),
                (None, MatchedBy::Name) => tracing::warn!(
                    submission_id = ?ids.submission_id,
                    chosen = %candidate.submission_id,
                    scanned,
                    limit = self.name_scan_limit,
                    "Candidate resolved by fuzzy name match"
                ),
                _ => {}
            }
            return Ok(Some(resolution));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCandidateStore;
    use chrono::{Duration, TimeZone, Utc};

    fn candidate(submission_id: &str, name: &str, cpf: Option<&str>, minutes: i64) -> Candidate {
        let base = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        let mut c = Candidate::new(submission_id, None, base + Duration::minutes(minutes));
        c.name = name.to_string();
        c.cpf = cpf.map(str::to_string);
        c
    }

    fn ids(name: &str, cpf: Option<&str>) -> Identifiers {
        Identifiers {
            name: Some(name.to_string()),
            cpf: cpf.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn cpf_tie_break_prefers_name_match() {
        let pool = vec![
            candidate("a", "Carlos Souza", Some("1"), 0),
            candidate("b", "Maria Souza", Some("1"), 5),
        ];
        let r = select(MatchedBy::Cpf, &ids("maria souza", Some("1")), pool).unwrap();
        assert_eq!(r.candidate.submission_id, "b");
        assert_eq!(r.ambiguity, Some(Ambiguity::CpfNameTieBreak { candidates: 2 }));
    }

    #[test]
    fn cpf_tie_break_falls_back_to_oldest() {
        let pool = vec![
            candidate("a", "Carlos Souza", Some("1"), 0),
            candidate("b", "Maria Souza", Some("1"), 5),
        ];
        let r = select(MatchedBy::Cpf, &ids("Pedro Lima", Some("1")), pool).unwrap();
        assert_eq!(r.candidate.submission_id, "a");
        assert_eq!(r.ambiguity, Some(Ambiguity::CpfFirstByCreation { candidates: 2 }));
    }

    #[test]
    fn name_matcher_skips_placeholder_records() {
        let pool = vec![
            candidate("a", "Não identificado", None, 0),
            candidate("b", "Ana Lima", None, 1),
        ];
        let r = select(MatchedBy::Name, &ids("ana  lima", None), pool).unwrap();
        assert_eq!(r.candidate.submission_id, "b");
        assert!(select(MatchedBy::Name, &Identifiers::default(), Vec::new()).is_none());
    }

    #[tokio::test]
    async fn earlier_matchers_win_over_later_ones() {
        let store = MemoryCandidateStore::new();
        let mut by_email = candidate("by-email", "Ana Lima", None, 0);
        by_email.email = Some("ana@mail.com".into());
        store.upsert(&by_email).await.unwrap();
        store
            .upsert(&candidate("by-cpf", "Ana Lima", Some("12345678901"), 1))
            .await
            .unwrap();

        let resolver = CandidateResolver::new(100);
        let r = resolver
            .resolve(
                &store,
                &Identifiers {
                    email: Some("ANA@mail.com".into()),
                    cpf: Some("123.456.789-01".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(r.matched_by, MatchedBy::Email);
        assert_eq!(r.candidate.submission_id, "by-email");
    }

    #[tokio::test]
    async fn phone_match_with_different_cpf_is_rejected() {
        let store = MemoryCandidateStore::new();
        let mut existing = candidate("s-1", "Ana Lima", Some("11111111111"), 0);
        existing.phone = Some("67992992381".into());
        store.upsert(&existing).await.unwrap();

        let resolver = CandidateResolver::new(100);
        let r = resolver
            .resolve(
                &store,
                &Identifiers {
                    phone: Some("(67) 99299-2381".into()),
                    cpf: Some("22222222222".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(r.is_none());
    }

    #[tokio::test]
    async fn name_fallback_only_scans_recent_records() {
        let store = MemoryCandidateStore::new();
        store.upsert(&candidate("old", "Ana Lima", None, 0)).await.unwrap();
        store.upsert(&candidate("new", "Bruno Costa", None, 10)).await.unwrap();

        let narrow = CandidateResolver::new(1);
        assert!(narrow.resolve(&store, &ids("Ana Lima", None)).await.unwrap().is_none());

        let wide = CandidateResolver::new(10);
        let r = wide.resolve(&store, &ids("Ana Lima", None)).await.unwrap().unwrap();
        assert_eq!(r.matched_by, MatchedBy::Name);
        assert_eq!(r.candidate.submission_id, "old");
    }
}
