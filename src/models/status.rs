use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::normalize::normalize_text;

/// Kanban column of a candidate. The set is open: labels the board invents later
/// are carried through as [`CandidateStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CandidateStatus {
    AnalyzedByAi,
    InProgress,
    Exams,
    Interview,
    Approved,
    Rejected,
    TalentPool,
    Blacklist,
    Hired,
    Other(String),
}

const KNOWN: [(CandidateStatus, &str, &str); 9] = [
    (CandidateStatus::AnalyzedByAi, "Analisado por IA", "analyzed by ai"),
    (CandidateStatus::InProgress, "Em progresso", "in progress"),
    (CandidateStatus::Exams, "Provas", "exams"),
    (CandidateStatus::Interview, "Entrevista", "interview"),
    (CandidateStatus::Approved, "Aprovado", "approved"),
    (CandidateStatus::Rejected, "Reprovado", "rejected"),
    (CandidateStatus::TalentPool, "Banco de talentos", "talent pool"),
    (CandidateStatus::Blacklist, "Blacklist", "blacklist"),
    (CandidateStatus::Hired, "Contratado", "hired"),
];

impl CandidateStatus {
    /// Status every freshly ingested candidate starts in.
    pub const INITIAL: CandidateStatus = CandidateStatus::AnalyzedByAi;

    pub fn as_str(&self) -> &str {
        match self {
            CandidateStatus::Other(label) => label,
            known => KNOWN
                .iter()
                .find(|(status, _, _)| status == known)
                .map(|(_, label, _)| *label)
                .unwrap_or_default(),
        }
    }

    /// Accepts board labels and English names, ignoring case and accents.
    pub fn parse(raw: &str) -> Self {
        let key = normalize_text(raw);
        KNOWN
            .iter()
            .find(|(_, label, english)| normalize_text(label) == key || *english == key)
            .map(|(status, _, _)| status.clone())
            .unwrap_or_else(|| CandidateStatus::Other(raw.trim().to_string()))
    }

    /// Transitions that send the candidate a message.
    pub fn notifies_candidate(&self) -> bool {
        matches!(
            self,
            CandidateStatus::Rejected
                | CandidateStatus::Interview
                | CandidateStatus::Exams
                | CandidateStatus::TalentPool
        )
    }

    /// Legacy imports wrote the exam score into the status column.
    pub fn is_bare_number(&self) -> bool {
        match self {
            CandidateStatus::Other(label) => {
                let label = label.trim();
                !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
            }
            _ => false,
        }
    }

    pub fn all_known() -> impl Iterator<Item = CandidateStatus> {
        KNOWN.into_iter().map(|(status, _, _)| status)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CandidateStatus {
    fn from(raw: String) -> Self {
        CandidateStatus::parse(&raw)
    }
}

impl Serialize for CandidateStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CandidateStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(CandidateStatus::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_english_names() {
        assert_eq!(CandidateStatus::parse("reprovado"), CandidateStatus::Rejected);
        assert_eq!(CandidateStatus::parse("Talent pool"), CandidateStatus::TalentPool);
        assert_eq!(CandidateStatus::parse("ANALISADO POR IA"), CandidateStatus::AnalyzedByAi);
        assert_eq!(
            CandidateStatus::parse("Triagem"),
            CandidateStatus::Other("Triagem".to_string())
        );
    }

    #[test]
    fn serializes_as_board_label() {
        let json = serde_json::to_string(&CandidateStatus::TalentPool).unwrap();
        assert_eq!(json, "\"Banco de talentos\"");
        let back: CandidateStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CandidateStatus::TalentPool);
    }

    #[test]
    fn only_contact_worthy_transitions_notify() {
        assert!(CandidateStatus::Rejected.notifies_candidate());
        assert!(CandidateStatus::Exams.notifies_candidate());
        assert!(!CandidateStatus::Approved.notifies_candidate());
        assert!(!CandidateStatus::Other("x".into()).notifies_candidate());
    }

    #[test]
    fn detects_legacy_numeric_statuses() {
        assert!(CandidateStatus::parse("7").is_bare_number());
        assert!(!CandidateStatus::parse("Provas").is_bare_number());
    }
}
