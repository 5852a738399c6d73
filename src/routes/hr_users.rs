use axum::{extract::State, Json};

use crate::{error::Result, models::hr_user::HrUser, AppState};

pub async fn list_hr_users(State(state): State<AppState>) -> Result<Json<Vec<HrUser>>> {
    let users = state.store.list_hr_users().await?;
    Ok(Json(users))
}
