use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::matching::enhancement::{CombinedInsights, EnhancedResult};

/// Deterministic explanation stored with every match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Stored outcome of scoring one resume against one job. Unique per (resume_id, job_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub base_score: f64,
    /// Final score: blended when `ai_enabled`, otherwise equal to `base_score`.
    pub score: f64,
    pub ai_enabled: bool,
    pub details: ScoreDetails,
    pub combined_insights: Option<CombinedInsights>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn from_enhanced(
        owner_id: Uuid,
        resume_id: Uuid,
        job_id: Uuid,
        enhanced: EnhancedResult,
        processing_time_ms: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let result = enhanced.result;
        Self {
            resume_id,
            job_id,
            owner_id,
            base_score: enhanced.base_score,
            score: result.score,
            ai_enabled: enhanced.ai_enabled,
            details: ScoreDetails {
                matched_keywords: result.matched_keywords,
                missing_keywords: result.missing_keywords,
                strengths: result.strengths,
                recommendations: result.recommendations,
            },
            combined_insights: enhanced.combined_insights,
            processing_time_ms,
            created_at,
        }
    }
}

/// A match joined with its document titles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub record: MatchRecord,
    pub resume_title: String,
    pub job_title: String,
}

/// Audit projection: includes matches whose documents were deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub view: MatchView,
    pub resume_deleted: bool,
    pub job_deleted: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchRow {
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub base_score: f64,
    pub score: f64,
    pub ai_enabled: bool,
    pub details: Json<ScoreDetails>,
    pub combined_insights: Option<Json<CombinedInsights>>,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl From<MatchRow> for MatchRecord {
    fn from(row: MatchRow) -> Self {
        Self {
            resume_id: row.resume_id,
            job_id: row.job_id,
            owner_id: row.owner_id,
            base_score: row.base_score,
            score: row.score,
            ai_enabled: row.ai_enabled,
            details: row.details.0,
            combined_insights: row.combined_insights.map(|j| j.0),
            processing_time_ms: u64::try_from(row.processing_time_ms).unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

/// `match_records` joined with both documents.
#[derive(Debug, Clone, FromRow)]
pub struct MatchViewRow {
    #[sqlx(flatten)]
    pub record: MatchRow,
    pub resume_title: String,
    pub job_title: String,
    pub resume_deleted: bool,
    pub job_deleted: bool,
}

impl MatchViewRow {
    pub fn into_audit(self) -> AuditEntry {
        AuditEntry {
            view: MatchView {
                record: self.record.into(),
                resume_title: self.resume_title,
                job_title: self.job_title,
            },
            resume_deleted: self.resume_deleted,
            job_deleted: self.job_deleted,
        }
    }

    pub fn into_view(self) -> MatchView {
        self.into_audit().view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::similarity::ScoreResult;

    #[test]
    fn test_record_from_deterministic_result() {
        let enhanced = EnhancedResult::deterministic(ScoreResult {
            score: 42.5,
            matched_keywords: vec!["rust".to_string()],
            missing_keywords: vec!["go".to_string()],
            strengths: vec![],
            recommendations: vec![],
        });
        let record = MatchRecord::from_enhanced(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            enhanced,
            3,
            Utc::now(),
        );
        assert_eq!(record.score, 42.5);
        assert_eq!(record.base_score, 42.5);
        assert!(!record.ai_enabled);
        assert_eq!(record.details.matched_keywords, vec!["rust"]);
        assert_eq!(record.processing_time_ms, 3);
    }

    #[test]
    fn test_view_serializes_flat() {
        let record = MatchRecord::from_enhanced(
            Uuid::nil(),
            Uuid::nil(),
            Uuid::nil(),
            EnhancedResult::deterministic(ScoreResult {
                score: 10.0,
                matched_keywords: vec![],
                missing_keywords: vec![],
                strengths: vec![],
                recommendations: vec![],
            }),
            0,
            Utc::now(),
        );
        let view = MatchView {
            record,
            resume_title: "CV".to_string(),
            job_title: "Backend".to_string(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["score"], 10.0);
        assert_eq!(json["job_title"], "Backend");
        assert!(json.get("record").is_none());
    }
}
