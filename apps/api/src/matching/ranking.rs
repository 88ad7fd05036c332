//! Ranker: filtered, ordered, paginated reads over stored matches.
//!
//! Ordering is score desc, then `created_at` desc, then resume id (then job id for
//! cross-job reads), so pages are stable across calls.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::require_document;
use crate::models::{AuditEntry, DocumentKind, MatchView};
use crate::store::{DocumentStore, MatchStore};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Raw query parameters. Signed so out-of-range values reach validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MatchQuery {
    pub min_score: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl MatchQuery {
    pub fn validate(&self) -> Result<PageRequest, AppError> {
        PageRequest::new(self.min_score, self.limit, self.offset)
    }
}

/// Validated filter and window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub min_score: Option<f64>,
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(
        min_score: Option<f64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Self, AppError> {
        if let Some(min) = min_score {
            if !min.is_finite() || !(0.0..=100.0).contains(&min) {
                return Err(AppError::InvalidFilterRange(format!(
                    "min_score must be between 0 and 100, got {min}"
                )));
            }
        }

        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(l) => usize::try_from(l)
                .ok()
                .filter(|l| (1..=MAX_LIMIT).contains(l))
                .ok_or_else(|| {
                    AppError::InvalidFilterRange(format!(
                        "limit must be between 1 and {MAX_LIMIT}, got {l}"
                    ))
                })?,
        };

        let offset = match offset {
            None => 0,
            Some(o) => usize::try_from(o).map_err(|_| {
                AppError::InvalidFilterRange(format!("offset must not be negative, got {o}"))
            })?,
        };

        Ok(Self {
            min_score,
            limit,
            offset,
        })
    }

    pub fn admits(&self, score: f64) -> bool {
        self.min_score.map_or(true, |min| score >= min)
    }

    /// Applies the offset / limit window.
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPage {
    pub matches: Vec<MatchView>,
    /// Matches passing the filter, before pagination.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

pub fn compare_matches(a: &MatchView, b: &MatchView) -> Ordering {
    b.record
        .score
        .total_cmp(&a.record.score)
        .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        .then_with(|| a.record.resume_id.cmp(&b.record.resume_id))
        .then_with(|| a.record.job_id.cmp(&b.record.job_id))
}

/// Filters by `min_score`, orders, and cuts one page.
pub fn rank(matches: Vec<MatchView>, page: &PageRequest) -> MatchPage {
    let mut matches: Vec<MatchView> = matches
        .into_iter()
        .filter(|m| page.admits(m.record.score))
        .collect();
    matches.sort_by(compare_matches);

    MatchPage {
        total: matches.len(),
        matches: page.window(matches),
        limit: page.limit,
        offset: page.offset,
    }
}

/// Ranked matches for one active job of the owner.
pub async fn get_matches_for_job(
    documents: &dyn DocumentStore,
    matches: &dyn MatchStore,
    owner_id: Uuid,
    job_id: Uuid,
    query: &MatchQuery,
) -> Result<MatchPage, AppError> {
    let page = query.validate()?;
    require_document(documents, owner_id, job_id, DocumentKind::Job).await?;
    let views = matches.active_matches_for_job(owner_id, job_id).await?;
    Ok(rank(views, &page))
}

/// Best matches across all of the owner's jobs.
pub async fn get_top_matches(
    matches: &dyn MatchStore,
    owner_id: Uuid,
    limit: Option<i64>,
) -> Result<MatchPage, AppError> {
    let page = PageRequest::new(None, limit, None)?;
    let views = matches.active_matches(owner_id).await?;
    Ok(rank(views, &page))
}

/// Every active match of the owner, most recent first.
pub async fn get_all_matches(
    matches: &dyn MatchStore,
    owner_id: Uuid,
) -> Result<Vec<MatchView>, AppError> {
    let mut views = matches.active_matches(owner_id).await?;
    views.sort_by(|a, b| {
        b.record
            .created_at
            .cmp(&a.record.created_at)
            .then_with(|| compare_matches(a, b))
    });
    Ok(views)
}

/// Every stored match including those of deleted documents, most recent first.
pub async fn audit_matches(
    matches: &dyn MatchStore,
    owner_id: Uuid,
) -> Result<Vec<AuditEntry>, AppError> {
    let mut entries = matches.audit_matches(owner_id).await?;
    entries.sort_by(|a, b| {
        b.view
            .record
            .created_at
            .cmp(&a.view.record.created_at)
            .then_with(|| compare_matches(&a.view, &b.view))
    });
    Ok(entries)
}
