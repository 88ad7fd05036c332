// Matching engine: features → similarity → optional AI enrichment → stored, ranked matches.

pub mod cache;
pub mod candidates;
pub mod enhancement;
pub mod features;
pub mod handlers;
pub mod prompts;
pub mod ranking;
pub mod service;
pub mod similarity;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Document, DocumentKind};
use crate::store::DocumentStore;

pub use service::{MatchOptions, MatchService};

/// Loads an active document of the expected kind; anything else is `NotFound`.
pub async fn require_document(
    documents: &dyn DocumentStore,
    owner_id: Uuid,
    id: Uuid,
    kind: DocumentKind,
) -> Result<Document, AppError> {
    documents
        .get_active(owner_id, id)
        .await?
        .filter(|doc| doc.kind == kind)
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", kind.as_str())))
}
