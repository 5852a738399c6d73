use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::status::CandidateStatus;
use crate::utils::dates::age_on;

pub const UNIDENTIFIED_NAME: &str = "Não identificado";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalBlock {
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "telefone")]
    pub phone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default, alias = "cidade")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalBlock {
    #[serde(default, alias = "vaga")]
    pub role: Option<String>,
    #[serde(default, alias = "experiencia")]
    pub experience: Option<String>,
    #[serde(default, alias = "escolaridade")]
    pub education: Option<String>,
    #[serde(default)]
    pub role_title: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub differentials: Vec<String>,
}

/// AI-structured view of the raw answers plus the role requirement snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredProfile {
    #[serde(default, alias = "pessoal")]
    pub personal: PersonalBlock,
    #[serde(default, alias = "profissional")]
    pub professional: ProfessionalBlock,
}

impl StructuredProfile {
    /// Personal name unless it is the template placeholder or too short to be real.
    pub fn usable_name(&self) -> Option<&str> {
        self.personal
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| name.chars().count() >= 2 && !name.eq_ignore_ascii_case("texto"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPoint {
    #[serde(default, alias = "ponto")]
    pub point: String,
    #[serde(default, alias = "evidencia")]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityAnalysis {
    #[serde(default, alias = "resumo_profissional")]
    pub summary: Option<String>,
    #[serde(default, alias = "pontos_fortes")]
    pub strengths: Vec<AnalysisPoint>,
    #[serde(default, alias = "pontos_fracos")]
    pub weaknesses: Vec<AnalysisPoint>,
    #[serde(default, alias = "pontuacao_final")]
    pub score: Option<f64>,
    #[serde(default, alias = "justificativa_pontuacao")]
    pub score_rationale: Option<String>,
    #[serde(default, alias = "recomendacao")]
    pub recommendation: Option<String>,
    #[serde(default, alias = "perguntas_entrevista")]
    pub interview_questions: Vec<String>,
}

pub fn recommendation_for(score: f64) -> &'static str {
    if score <= 40.0 {
        "Não Recomendado"
    } else if score <= 70.0 {
        "Recomendado"
    } else {
        "Altamente Recomendado"
    }
}

impl SuitabilityAnalysis {
    /// Clamps the score into 0..=100 and derives the recommendation when absent.
    pub fn normalized(mut self) -> Self {
        if let Some(score) = self.score {
            let score = score.clamp(0.0, 100.0);
            self.score = Some(score);
            if self.recommendation.as_deref().map_or(true, |r| r.trim().is_empty()) {
                self.recommendation = Some(recommendation_for(score).to_string());
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: CandidateStatus,
    pub timestamp: DateTime<Utc>,
}

/// Time spent in one kanban phase; used for cycle-time reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Canonical record of one applicant, keyed by the submission that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub submission_id: String,
    #[serde(default)]
    pub linked_submission_ids: Vec<String>,
    pub form_id: Option<String>,
    pub name: String,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub resume_url: Option<String>,
    pub profile: Option<StructuredProfile>,
    pub analysis: Option<SuitabilityAnalysis>,
    #[serde(default)]
    pub exam_scores: BTreeMap<String, f64>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub status_history: Vec<StatusEntry>,
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseWindow>,
    pub raw_data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// New record in the initial status with its first history entry.
    pub fn new(submission_id: impl Into<String>, form_id: Option<String>, now: DateTime<Utc>) -> Self {
        let status = CandidateStatus::INITIAL;
        let mut phases = BTreeMap::new();
        phases.insert(
            status.as_str().to_string(),
            PhaseWindow {
                started_at: now,
                ended_at: None,
            },
        );
        Self {
            id: Uuid::new_v4(),
            submission_id: submission_id.into(),
            linked_submission_ids: Vec::new(),
            form_id,
            name: UNIDENTIFIED_NAME.to_string(),
            cpf: None,
            phone: None,
            email: None,
            birth_date: None,
            resume_url: None,
            profile: None,
            analysis: None,
            exam_scores: BTreeMap::new(),
            status: status.clone(),
            status_history: vec![StatusEntry {
                status,
                timestamp: now,
            }],
            phases,
            raw_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_placeholder_name(&self) -> bool {
        let name = self.name.trim();
        name.is_empty() || name == UNIDENTIFIED_NAME
    }

    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|birth| age_on(birth, today))
    }

    /// Status of the newest history entry; falls back to the status column for
    /// records imported before history was tracked.
    pub fn last_recorded_status(&self) -> &CandidateStatus {
        self.status_history
            .last()
            .map(|entry| &entry.status)
            .unwrap_or(&self.status)
    }

    /// Moves the candidate to `status`. Returns `false` without touching anything
    /// when that status is already the last recorded one.
    pub fn transition_to(&mut self, status: CandidateStatus, now: DateTime<Utc>) -> bool {
        if *self.last_recorded_status() == status && !self.status_history.is_empty() {
            return false;
        }
        if let Some(open) = self.phases.get_mut(self.status.as_str()) {
            if open.ended_at.is_none() {
                open.ended_at = Some(now);
            }
        }
        self.phases.insert(
            status.as_str().to_string(),
            PhaseWindow {
                started_at: now,
                ended_at: None,
            },
        );
        self.status_history.push(StatusEntry {
            status: status.clone(),
            timestamp: now,
        });
        self.status = status;
        self.updated_at = now;
        true
    }

    /// Records that `submission_id` belongs to this candidate as well.
    pub fn link_submission(&mut self, submission_id: &str) {
        if self.submission_id != submission_id
            && !self.linked_submission_ids.iter().any(|id| id == submission_id)
        {
            self.linked_submission_ids.push(submission_id.to_string());
        }
    }

    pub fn owns_submission(&self, submission_id: &str) -> bool {
        self.submission_id == submission_id
            || self.linked_submission_ids.iter().any(|id| id == submission_id)
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("Candidato")
    }
}
