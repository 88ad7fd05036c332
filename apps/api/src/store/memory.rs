//! In-process store for local development and tests.
//!
//! Per-pair writes go through the DashMap entry API, which holds the shard lock for the
//! compare-and-replace. Reads clone a snapshot and never hold a guard across an await.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AuditEntry, Document, DocumentKind, MatchRecord, MatchView};
use crate::store::{DocumentStore, MatchStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<Uuid, Document>,
    matches: DashMap<(Uuid, Uuid), MatchRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn document_meta(&self, id: &Uuid) -> Option<(String, bool)> {
        self.documents
            .get(id)
            .map(|doc| (doc.title.clone(), doc.is_deleted))
    }

    /// Joins matching records with their documents. Records whose documents vanished are skipped.
    fn joined(&self, keep: impl Fn(&MatchRecord) -> bool) -> Vec<AuditEntry> {
        let records: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        records
            .into_iter()
            .filter_map(|record| {
                let (resume_title, resume_deleted) = self.document_meta(&record.resume_id)?;
                let (job_title, job_deleted) = self.document_meta(&record.job_id)?;
                Some(AuditEntry {
                    view: MatchView {
                        record,
                        resume_title,
                        job_title,
                    },
                    resume_deleted,
                    job_deleted,
                })
            })
            .collect()
    }

    fn active(&self, keep: impl Fn(&MatchRecord) -> bool) -> Vec<MatchView> {
        self.joined(keep)
            .into_iter()
            .filter(|entry| !entry.resume_deleted && !entry.job_deleted)
            .map(|entry| entry.view)
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: Document) -> Result<Document, StoreError> {
        self.documents.insert(document.id, document.clone());
        debug!("Inserted {} document {}", document.kind.as_str(), document.id);
        Ok(document)
    }

    async fn get_active(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .get(&id)
            .filter(|doc| doc.owner_id == owner_id && !doc.is_deleted)
            .map(|doc| doc.value().clone()))
    }

    async fn list_active(
        &self,
        owner_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StoreError> {
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.is_active_for(owner_id, kind))
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(documents)
    }

    async fn update_text(
        &self,
        owner_id: Uuid,
        id: Uuid,
        raw_text: String,
    ) -> Result<Option<Document>, StoreError> {
        let Some(mut doc) = self.documents.get_mut(&id) else {
            return Ok(None);
        };
        if doc.owner_id != owner_id || doc.is_deleted {
            return Ok(None);
        }
        doc.set_text(raw_text);
        Ok(Some(doc.value().clone()))
    }

    async fn soft_delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let Some(mut doc) = self.documents.get_mut(&id) else {
            return Ok(false);
        };
        if doc.owner_id != owner_id || doc.is_deleted {
            return Ok(false);
        }
        doc.is_deleted = true;
        doc.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn upsert(&self, record: MatchRecord) -> Result<MatchRecord, StoreError> {
        let stored = match self.matches.entry((record.resume_id, record.job_id)) {
            Entry::Occupied(mut existing) => {
                if existing.get().created_at <= record.created_at {
                    existing.insert(record);
                } else {
                    debug!(
                        "Kept newer match for resume {} / job {}",
                        record.resume_id, record.job_id
                    );
                }
                existing.get().clone()
            }
            Entry::Vacant(slot) => slot.insert(record).value().clone(),
        };
        Ok(stored)
    }

    async fn active_matches_for_job(
        &self,
        owner_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError> {
        Ok(self.active(|m| m.owner_id == owner_id && m.job_id == job_id))
    }

    async fn active_matches_for_resume(
        &self,
        owner_id: Uuid,
        resume_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError> {
        Ok(self.active(|m| m.owner_id == owner_id && m.resume_id == resume_id))
    }

    async fn active_matches(&self, owner_id: Uuid) -> Result<Vec<MatchView>, StoreError> {
        Ok(self.active(|m| m.owner_id == owner_id))
    }

    async fn audit_matches(&self, owner_id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.joined(|m| m.owner_id == owner_id))
    }
}
