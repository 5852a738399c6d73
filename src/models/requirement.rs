use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Qualification snapshot for a role, matched to submissions by normalized role name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RoleRequirements {
    pub id: i64,
    pub role_name: String,
    pub requirements: Option<String>,
    pub differentials: Option<String>,
    pub locations: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

fn lines(text: Option<&str>) -> Vec<String> {
    text.unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl RoleRequirements {
    pub fn requirement_list(&self) -> Vec<String> {
        lines(self.requirements.as_deref())
    }

    pub fn differential_list(&self) -> Vec<String> {
        lines(self.differentials.as_deref())
    }

    pub fn location_list(&self) -> Vec<String> {
        lines(self.locations.as_deref())
    }
}
