use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::features::{extract_features, FeatureSet};
use crate::matching::require_document;
use crate::models::{Document, DocumentKind};
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub user_id: Uuid,
    pub title: String,
    pub text: String,
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    pub user_id: Uuid,
    pub text: String,
}

#[derive(Deserialize)]
pub struct FeaturesRequest {
    pub text: String,
}

fn require_text(text: String) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Job description text is empty".to_string()));
    }
    Ok(text)
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Job title is empty".to_string()));
    }
    let text = require_text(req.text)?;

    let job = Document::new(req.user_id, DocumentKind::Job, title, text);
    let job = state.documents.insert(job).await?;
    info!(job_id = %job.id, keywords = job.features.keywords.len(), "Job created");
    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<Document>, AppError> {
    let text = require_text(req.text)?;
    require_document(state.documents.as_ref(), req.user_id, id, DocumentKind::Job).await?;

    let job = state
        .documents
        .update_text(req.user_id, id, text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;
    Ok(Json(job))
}

/// DELETE /api/v1/documents/:id
/// Soft delete; existing matches drop out of every read except the audit view.
pub async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    if !state.documents.soft_delete(params.user_id, id).await? {
        return Err(AppError::NotFound(format!("document {id} not found")));
    }
    info!(document_id = %id, "Document soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/features
pub async fn handle_extract_features(Json(req): Json<FeaturesRequest>) -> Json<FeatureSet> {
    Json(extract_features(&req.text))
}
