pub mod candidate_routes;
pub mod health;
pub mod hr_users;
pub mod maintenance;
pub mod webhook;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth::require_bearer_auth, rate_limit};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let webhooks = Router::new()
        .route("/webhooks/form-response", post(webhook::handle_form_response))
        .route("/webhooks/exam-score", post(webhook::handle_exam_score))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(state.webhook_rps),
            rate_limit::rps_middleware,
        ));

    let api = Router::new()
        .route("/api/candidates", get(candidate_routes::list_candidates))
        .route(
            "/api/candidates/:submission_id",
            get(candidate_routes::get_candidate),
        )
        .route(
            "/api/candidates/:submission_id/status",
            patch(candidate_routes::update_candidate_status),
        )
        .route("/api/hr-users", get(hr_users::list_hr_users))
        .route("/api/imports", post(maintenance::run_import))
        .route(
            "/api/maintenance/exam-statuses",
            post(maintenance::repair_exam_statuses),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(webhooks)
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
