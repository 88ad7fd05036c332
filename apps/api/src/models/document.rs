use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::matching::features::{extract_features, FeatureSet};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Resume,
    Job,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::Job => "job",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resume" => Some(DocumentKind::Resume),
            "job" => Some(DocumentKind::Job),
            _ => None,
        }
    }
}

/// A resume or job description owned by one account. Soft-deleted only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub raw_text: String,
    pub features: FeatureSet,
    /// Object-storage key of the original upload (resumes only).
    pub file_key: Option<String>,
    pub mime_type: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Builds a fresh document with features derived from `raw_text`.
    pub fn new(owner_id: Uuid, kind: DocumentKind, title: String, raw_text: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind,
            title,
            features: extract_features(&raw_text),
            raw_text,
            file_key: None,
            mime_type: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_upload(mut self, file_key: String, mime_type: &str) -> Self {
        self.file_key = Some(file_key);
        self.mime_type = Some(mime_type.to_string());
        self
    }

    /// Replaces the text and recomputes features.
    pub fn set_text(&mut self, raw_text: String) {
        self.features = extract_features(&raw_text);
        self.raw_text = raw_text;
        self.updated_at = Utc::now();
    }

    pub fn is_active_for(&self, owner_id: Uuid, kind: DocumentKind) -> bool {
        !self.is_deleted && self.owner_id == owner_id && self.kind == kind
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub title: String,
    pub raw_text: String,
    pub features: Json<FeatureSet>,
    pub file_key: Option<String>,
    pub mime_type: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let kind = DocumentKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown document kind '{}'", row.kind)))?;
        Ok(Document {
            id: row.id,
            owner_id: row.owner_id,
            kind,
            title: row.title,
            raw_text: row.raw_text,
            features: row.features.0,
            file_key: row.file_key,
            mime_type: row.mime_type,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
