use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::{validate_and_extract, DocumentType, ExtractedDocument, IntakeError};
use crate::matching::require_document;
use crate::models::{Document, DocumentKind};
use crate::routes::UserIdQuery;
use crate::state::AppState;
use crate::storage::resume_key;

struct Upload {
    filename: String,
    content_type: String,
    bytes: Bytes,
    title: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut title = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((filename, content_type, bytes));
            }
            Some("title") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read title: {e}")))?;
                title = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    Ok(Upload {
        filename,
        content_type,
        bytes,
        title,
    })
}

/// Runs validation and extraction off the async runtime; PDF parsing is CPU-bound.
async fn extract_off_thread(
    bytes: Bytes,
    filename: String,
    content_type: String,
) -> Result<ExtractedDocument, AppError> {
    let extracted = tokio::task::spawn_blocking(move || {
        validate_and_extract(&bytes, &filename, &content_type)
    })
    .await
    .map_err(|e| IntakeError::ExtractionFailed(format!("extraction worker failed: {e}")))??;
    Ok(extracted)
}

/// Puts the original to blob storage, then inserts the document that references it.
/// A failed insert removes the blob again so no upload is left unreferenced.
async fn store_upload(
    state: &AppState,
    document: Document,
    bytes: Bytes,
    doc_type: DocumentType,
) -> Result<Document, AppError> {
    let key = resume_key(document.owner_id, document.id, doc_type.extension());
    state.blobs.put(&key, bytes, doc_type.mime_type()).await?;

    let document = document.with_upload(key.clone(), doc_type.mime_type());
    match state.documents.insert(document).await {
        Ok(document) => Ok(document),
        Err(e) => {
            if let Err(cleanup) = state.blobs.delete(&key).await {
                warn!("Failed to remove orphaned upload {key}: {cleanup}");
            }
            Err(e.into())
        }
    }
}

fn title_from_filename(filename: &str) -> String {
    let stem = std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim();
    if stem.is_empty() {
        "Untitled resume".to_string()
    } else {
        stem.to_string()
    }
}

/// POST /api/v1/resumes?user_id=
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let upload = read_upload(multipart).await?;
    let title = upload
        .title
        .clone()
        .unwrap_or_else(|| title_from_filename(&upload.filename));

    let extracted = extract_off_thread(
        upload.bytes.clone(),
        upload.filename.clone(),
        upload.content_type.clone(),
    )
    .await?;

    let document = Document::new(params.user_id, DocumentKind::Resume, title, extracted.text);
    let document = store_upload(&state, document, upload.bytes, extracted.doc_type).await?;

    info!(
        resume_id = %document.id,
        doc_type = extracted.doc_type.extension(),
        word_count = extracted.word_count,
        "Resume uploaded"
    );
    Ok((StatusCode::CREATED, Json(document)))
}

/// POST /api/v1/resumes/:id/reprocess
/// Re-extracts text from the stored original and refreshes features.
pub async fn handle_reprocess_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Document>, AppError> {
    let resume =
        require_document(state.documents.as_ref(), params.user_id, id, DocumentKind::Resume)
            .await?;
    let key = resume.file_key.clone().ok_or_else(|| {
        AppError::Validation(format!("Resume {id} has no stored original to reprocess"))
    })?;
    let mime_type = resume.mime_type.clone().unwrap_or_default();

    let bytes = state.blobs.get(&key).await?;
    let extracted = extract_off_thread(bytes, key.clone(), mime_type).await?;

    let document = state
        .documents
        .update_text(params.user_id, id, extracted.text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resume {id} not found")))?;

    info!(resume_id = %id, word_count = extracted.word_count, "Resume reprocessed");
    Ok(Json(document))
}
