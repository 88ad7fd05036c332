use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::candidates::{
    get_candidate_details, get_candidates_for_job, list_candidates, CandidateDetails,
    CandidatePage, CandidateQuery,
};
use crate::matching::ranking::{
    audit_matches, get_all_matches, get_matches_for_job, get_top_matches, MatchPage, MatchQuery,
};
use crate::matching::MatchOptions;
use crate::models::{AuditEntry, MatchRecord, MatchView};
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ComputeMatchRequest {
    pub user_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    #[serde(flatten)]
    pub options: MatchOptions,
}

#[derive(Deserialize)]
pub struct BatchMatchRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub options: MatchOptions,
}

#[derive(Serialize)]
pub struct BatchMatchResponse {
    pub matches: Vec<MatchRecord>,
    pub count: usize,
    pub ai_enabled: bool,
}

impl BatchMatchResponse {
    fn new(matches: Vec<MatchRecord>) -> Self {
        Self {
            count: matches.len(),
            ai_enabled: matches.iter().any(|m| m.ai_enabled),
            matches,
        }
    }
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
}

/// POST /api/v1/matches
pub async fn handle_compute_match(
    State(state): State<AppState>,
    Json(req): Json<ComputeMatchRequest>,
) -> Result<Json<MatchRecord>, AppError> {
    let record = state
        .service
        .compute_match(req.user_id, req.resume_id, req.job_id, req.options)
        .await?;
    Ok(Json(record))
}

/// POST /api/v1/jobs/:id/matches
pub async fn handle_match_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<BatchMatchRequest>,
) -> Result<Json<BatchMatchResponse>, AppError> {
    let records = state
        .service
        .match_job(req.user_id, job_id, req.options)
        .await?;
    Ok(Json(BatchMatchResponse::new(records)))
}

/// POST /api/v1/resumes/:id/matches
pub async fn handle_match_resume(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(req): Json<BatchMatchRequest>,
) -> Result<Json<BatchMatchResponse>, AppError> {
    let records = state
        .service
        .match_resume(req.user_id, resume_id, req.options)
        .await?;
    Ok(Json(BatchMatchResponse::new(records)))
}

/// GET /api/v1/jobs/:id/matches
pub async fn handle_get_job_matches(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchPage>, AppError> {
    let page = get_matches_for_job(
        state.documents.as_ref(),
        state.matches.as_ref(),
        params.user_id,
        job_id,
        &query,
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/v1/matches/top
pub async fn handle_top_matches(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<MatchPage>, AppError> {
    let page = get_top_matches(state.matches.as_ref(), params.user_id, params.limit).await?;
    Ok(Json(page))
}

/// GET /api/v1/matches
pub async fn handle_all_matches(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<MatchView>>, AppError> {
    let views = get_all_matches(state.matches.as_ref(), params.user_id).await?;
    Ok(Json(views))
}

/// GET /api/v1/audit/matches
/// Includes matches whose resume or job has since been deleted.
pub async fn handle_audit_matches(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    let entries = audit_matches(state.matches.as_ref(), params.user_id).await?;
    Ok(Json(entries))
}

/// GET /api/v1/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<CandidatePage>, AppError> {
    let page = list_candidates(
        state.documents.as_ref(),
        state.matches.as_ref(),
        params.user_id,
        &query,
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/v1/jobs/:id/candidates
pub async fn handle_job_candidates(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<CandidatePage>, AppError> {
    let page = get_candidates_for_job(
        state.documents.as_ref(),
        state.matches.as_ref(),
        params.user_id,
        job_id,
        params.limit,
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/v1/candidates/:id
pub async fn handle_candidate_details(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CandidateDetails>, AppError> {
    let details = get_candidate_details(
        state.documents.as_ref(),
        state.matches.as_ref(),
        params.user_id,
        candidate_id,
    )
    .await?;
    Ok(Json(details))
}
