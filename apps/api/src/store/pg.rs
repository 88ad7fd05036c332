use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::document::DocumentRow;
use crate::models::matching::{MatchRow, MatchViewRow};
use crate::models::{AuditEntry, Document, DocumentKind, MatchRecord, MatchView};
use crate::store::{DocumentStore, MatchStore, StoreError};

const DOCUMENT_COLUMNS: &str = "id, owner_id, kind, title, raw_text, features, file_key, \
                                mime_type, is_deleted, created_at, updated_at";

const MATCH_COLUMNS: &str = "resume_id, job_id, owner_id, base_score, score, ai_enabled, \
                             details, combined_insights, processing_time_ms, created_at";

const MATCH_VIEW_SELECT: &str = r#"
SELECT m.resume_id, m.job_id, m.owner_id, m.base_score, m.score, m.ai_enabled, m.details,
       m.combined_insights, m.processing_time_ms, m.created_at,
       r.title AS resume_title, j.title AS job_title,
       r.is_deleted AS resume_deleted, j.is_deleted AS job_deleted
FROM match_records m
JOIN documents r ON r.id = m.resume_id
JOIN documents j ON j.id = m.job_id
"#;

const ACTIVE_ONLY: &str = "NOT r.is_deleted AND NOT j.is_deleted";

/// PostgreSQL-backed store (see `migrations/0001_matching.sql`).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_views(
        &self,
        sql: &str,
        owner_id: Uuid,
        id: Option<Uuid>,
    ) -> Result<Vec<MatchViewRow>, StoreError> {
        let mut query = sqlx::query_as::<_, MatchViewRow>(sql).bind(owner_id);
        if let Some(id) = id {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, document: Document) -> Result<Document, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, owner_id, kind, title, raw_text, features, file_key, mime_type,
                 is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id)
        .bind(document.owner_id)
        .bind(document.kind.as_str())
        .bind(&document.title)
        .bind(&document.raw_text)
        .bind(Json(&document.features))
        .bind(&document.file_key)
        .bind(&document.mime_type)
        .bind(document.is_deleted)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted {} document {}", document.kind.as_str(), document.id);
        Ok(document)
    }

    async fn get_active(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE id = $1 AND owner_id = $2 AND NOT is_deleted"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    async fn list_active(
        &self,
        owner_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE owner_id = $1 AND kind = $2 AND NOT is_deleted \
             ORDER BY created_at, id"
        ))
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Document::try_from).collect()
    }

    async fn update_text(
        &self,
        owner_id: Uuid,
        id: Uuid,
        raw_text: String,
    ) -> Result<Option<Document>, StoreError> {
        let Some(mut document) = self.get_active(owner_id, id).await? else {
            return Ok(None);
        };
        document.set_text(raw_text);

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET raw_text = $1, features = $2, updated_at = $3
            WHERE id = $4 AND owner_id = $5 AND NOT is_deleted
            "#,
        )
        .bind(&document.raw_text)
        .bind(Json(&document.features))
        .bind(document.updated_at)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        // Deleted between the read and the write.
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(document))
    }

    async fn soft_delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET is_deleted = TRUE, updated_at = $1 \
             WHERE id = $2 AND owner_id = $3 AND NOT is_deleted",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn upsert(&self, record: MatchRecord) -> Result<MatchRecord, StoreError> {
        // The conditional update keeps the newest computation per pair.
        let written = sqlx::query(
            r#"
            INSERT INTO match_records
                (resume_id, job_id, owner_id, base_score, score, ai_enabled, details,
                 combined_insights, processing_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (resume_id, job_id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                base_score = EXCLUDED.base_score,
                score = EXCLUDED.score,
                ai_enabled = EXCLUDED.ai_enabled,
                details = EXCLUDED.details,
                combined_insights = EXCLUDED.combined_insights,
                processing_time_ms = EXCLUDED.processing_time_ms,
                created_at = EXCLUDED.created_at
            WHERE match_records.created_at <= EXCLUDED.created_at
            "#,
        )
        .bind(record.resume_id)
        .bind(record.job_id)
        .bind(record.owner_id)
        .bind(record.base_score)
        .bind(record.score)
        .bind(record.ai_enabled)
        .bind(Json(&record.details))
        .bind(record.combined_insights.as_ref().map(Json))
        .bind(i64::try_from(record.processing_time_ms).unwrap_or(i64::MAX))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        if written.rows_affected() == 0 {
            debug!(
                "Kept newer match for resume {} / job {}",
                record.resume_id, record.job_id
            );
        }

        let stored: MatchRow = sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM match_records WHERE resume_id = $1 AND job_id = $2"
        ))
        .bind(record.resume_id)
        .bind(record.job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored.into())
    }

    async fn active_matches_for_job(
        &self,
        owner_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError> {
        let sql = format!(
            "{MATCH_VIEW_SELECT} WHERE m.owner_id = $1 AND m.job_id = $2 AND {ACTIVE_ONLY}"
        );
        let rows = self.fetch_views(&sql, owner_id, Some(job_id)).await?;
        Ok(rows.into_iter().map(MatchViewRow::into_view).collect())
    }

    async fn active_matches_for_resume(
        &self,
        owner_id: Uuid,
        resume_id: Uuid,
    ) -> Result<Vec<MatchView>, StoreError> {
        let sql = format!(
            "{MATCH_VIEW_SELECT} WHERE m.owner_id = $1 AND m.resume_id = $2 AND {ACTIVE_ONLY}"
        );
        let rows = self.fetch_views(&sql, owner_id, Some(resume_id)).await?;
        Ok(rows.into_iter().map(MatchViewRow::into_view).collect())
    }

    async fn active_matches(&self, owner_id: Uuid) -> Result<Vec<MatchView>, StoreError> {
        let sql = format!("{MATCH_VIEW_SELECT} WHERE m.owner_id = $1 AND {ACTIVE_ONLY}");
        let rows = self.fetch_views(&sql, owner_id, None).await?;
        Ok(rows.into_iter().map(MatchViewRow::into_view).collect())
    }

    async fn audit_matches(&self, owner_id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        let sql = format!("{MATCH_VIEW_SELECT} WHERE m.owner_id = $1");
        let rows = self.fetch_views(&sql, owner_id, None).await?;
        Ok(rows.into_iter().map(MatchViewRow::into_audit).collect())
    }
}
