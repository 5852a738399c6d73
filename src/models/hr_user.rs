use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recruiter account the board offers when assigning who owns a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HrUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub image_url: Option<String>,
}
