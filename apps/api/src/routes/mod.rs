pub mod documents;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::intake::handlers as intake;
use crate::matching::handlers as matching;
use crate::state::AppState;

/// Every read and delete is scoped to the calling account.
#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Documents
        .route("/api/v1/resumes", post(intake::handle_upload_resume))
        .route(
            "/api/v1/resumes/:id/reprocess",
            post(intake::handle_reprocess_resume),
        )
        .route("/api/v1/jobs", post(documents::handle_create_job))
        .route("/api/v1/jobs/:id", put(documents::handle_update_job))
        .route(
            "/api/v1/documents/:id",
            delete(documents::handle_delete_document),
        )
        .route("/api/v1/features", post(documents::handle_extract_features))
        // Matching
        .route(
            "/api/v1/matches",
            get(matching::handle_all_matches).post(matching::handle_compute_match),
        )
        .route("/api/v1/matches/top", get(matching::handle_top_matches))
        .route(
            "/api/v1/jobs/:id/matches",
            get(matching::handle_get_job_matches).post(matching::handle_match_job),
        )
        .route(
            "/api/v1/resumes/:id/matches",
            post(matching::handle_match_resume),
        )
        .route("/api/v1/audit/matches", get(matching::handle_audit_matches))
        // Candidates
        .route("/api/v1/candidates", get(matching::handle_list_candidates))
        .route(
            "/api/v1/candidates/:id",
            get(matching::handle_candidate_details),
        )
        .route(
            "/api/v1/jobs/:id/candidates",
            get(matching::handle_job_candidates),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}
