//! Persistence seams for documents and match records.
//!
//! `AppState` carries `Arc<dyn DocumentStore>` and `Arc<dyn MatchStore>`; the backend is picked
//! at startup by `MATCH_STORE` (`postgres` via sqlx, `memory` via DashMap).
//!
//! Every read except `audit_matches` hides soft-deleted documents and the matches that
//! reference them. Match reads come back in no particular order; `matching::ranking` owns
//! ordering and pagination so both backends rank identically.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuditEntry, Document, DocumentKind, MatchRecord, MatchView};

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: Document) -> Result<Document, StoreError>;

    /// The document if it exists, belongs to `owner_id` and is not deleted.
    async fn get_active(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Active documents of one kind, oldest first.
    async fn list_active(
        &self,
        owner_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StoreError>;

    /// Replaces the text of an active document and recomputes its features.
    async fn update_text(
        &self,
        owner_id: Uuid,
        id: Uuid,
        raw_text: String,
    ) -> Result<Option<Document>, StoreError>;

    /// Marks an active document deleted. Returns false when there was nothing to delete.
    async fn soft_delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Stores `record` unless a newer computation for the same pair is already stored.
    /// Returns whichever record is stored afterwards.
    async fn upsert(&self, record: MatchRecord) -> Result<MatchRecord, StoreError>;

    async fn active_matches_for_job(
        &self,
        owner_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError>;

    async fn active_matches_for_resume(
        &self,
        owner_id: Uuid,
        resume_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError>;

    async fn active_matches(&self, owner_id: Uuid) -> Result<Vec<MatchView>, StoreError>;

    /// Every stored match of the owner, including those of deleted documents.
    async fn audit_matches(&self, owner_id: Uuid) -> Result<Vec<AuditEntry>, StoreError>;
}
