//! Candidate Aggregator: one entry per resume with its best match, computed on read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::ranking::{compare_matches, PageRequest};
use crate::matching::require_document;
use crate::models::{DocumentKind, MatchView};
use crate::store::{DocumentStore, MatchStore};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CandidateQuery {
    pub min_score: Option<f64>,
    /// Restricts the best match to this job.
    pub job_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateView {
    pub resume_id: Uuid,
    pub resume_title: String,
    pub best_score: f64,
    pub best_job_id: Uuid,
    pub best_job_title: String,
    pub best_matched_at: DateTime<Utc>,
    pub match_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidatePage {
    pub candidates: Vec<CandidateView>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub title: String,
    pub word_count: usize,
    pub keyword_count: usize,
    pub sections: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateDetails {
    pub resume: ResumeSummary,
    pub best_score: Option<f64>,
    /// Active matches of this resume, best first.
    pub matches: Vec<MatchView>,
}

/// Collapses matches into one candidate per resume, ordered like matches.
pub fn aggregate(mut matches: Vec<MatchView>) -> Vec<CandidateView> {
    matches.sort_by(compare_matches);

    let mut order: Vec<Uuid> = Vec::new();
    let mut by_resume: HashMap<Uuid, CandidateView> = HashMap::new();
    for m in matches {
        // Sorted input: the first match seen for a resume is its best.
        by_resume
            .entry(m.record.resume_id)
            .and_modify(|c| c.match_count += 1)
            .or_insert_with(|| {
                order.push(m.record.resume_id);
                CandidateView {
                    resume_id: m.record.resume_id,
                    resume_title: m.resume_title.clone(),
                    best_score: m.record.score,
                    best_job_id: m.record.job_id,
                    best_job_title: m.job_title.clone(),
                    best_matched_at: m.record.created_at,
                    match_count: 1,
                }
            });
    }

    order
        .into_iter()
        .filter_map(|id| by_resume.remove(&id))
        .collect()
}

pub async fn list_candidates(
    documents: &dyn DocumentStore,
    matches: &dyn MatchStore,
    owner_id: Uuid,
    query: &CandidateQuery,
) -> Result<CandidatePage, AppError> {
    let page = PageRequest::new(query.min_score, query.limit, query.offset)?;

    let views = match query.job_id {
        Some(job_id) => {
            require_document(documents, owner_id, job_id, DocumentKind::Job).await?;
            matches.active_matches_for_job(owner_id, job_id).await?
        }
        None => matches.active_matches(owner_id).await?,
    };

    let candidates: Vec<CandidateView> = aggregate(views)
        .into_iter()
        .filter(|c| page.admits(c.best_score))
        .collect();

    Ok(CandidatePage {
        total: candidates.len(),
        candidates: page.window(candidates),
        limit: page.limit,
        offset: page.offset,
    })
}

pub async fn get_candidates_for_job(
    documents: &dyn DocumentStore,
    matches: &dyn MatchStore,
    owner_id: Uuid,
    job_id: Uuid,
    limit: Option<i64>,
) -> Result<CandidatePage, AppError> {
    let query = CandidateQuery {
        job_id: Some(job_id),
        limit,
        ..Default::default()
    };
    list_candidates(documents, matches, owner_id, &query).await
}

pub async fn get_candidate_details(
    documents: &dyn DocumentStore,
    matches: &dyn MatchStore,
    owner_id: Uuid,
    candidate_id: Uuid,
) -> Result<CandidateDetails, AppError> {
    let resume = require_document(documents, owner_id, candidate_id, DocumentKind::Resume).await?;

    let mut views = matches.active_matches_for_resume(owner_id, candidate_id).await?;
    views.sort_by(compare_matches);

    Ok(CandidateDetails {
        best_score: views.first().map(|m| m.record.score),
        resume: ResumeSummary {
            id: resume.id,
            title: resume.title,
            word_count: resume.features.word_count,
            keyword_count: resume.features.keywords.len(),
            sections: resume.features.sections.into_keys().collect(),
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        },
        matches: views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::enhancement::EnhancedResult;
    use crate::matching::similarity::ScoreResult;
    use crate::models::{Document, MatchRecord};
    use crate::store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        owner: Uuid,
        resumes: Vec<Document>,
        jobs: Vec<Document>,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut resumes = Vec::new();
        for (title, text) in [("Ana", "SKILLS\nRust Go"), ("Ben", "Java Spring")] {
            let doc = Document::new(owner, DocumentKind::Resume, title.into(), text.into());
            resumes.push(store.insert(doc).await.unwrap());
        }
        let mut jobs = Vec::new();
        for title in ["Backend", "Platform"] {
            let doc = Document::new(owner, DocumentKind::Job, title.into(), "Rust".into());
            jobs.push(store.insert(doc).await.unwrap());
        }
        Fixture {
            store,
            owner,
            resumes,
            jobs,
        }
    }

    async fn put(f: &Fixture, resume: usize, job: usize, score: f64) {
        let record = MatchRecord::from_enhanced(
            f.owner,
            f.resumes[resume].id,
            f.jobs[job].id,
            EnhancedResult::deterministic(ScoreResult {
                score,
                matched_keywords: vec![],
                missing_keywords: vec![],
                strengths: vec![],
                recommendations: vec![],
            }),
            0,
            Utc::now(),
        );
        f.store.upsert(record).await.unwrap();
    }

    #[tokio::test]
    async fn test_one_entry_per_resume_with_best_score() {
        let f = fixture().await;
        put(&f, 0, 0, 40.0).await;
        put(&f, 0, 1, 75.0).await;
        put(&f, 1, 0, 60.0).await;

        let page = list_candidates(&f.store, &f.store, f.owner, &CandidateQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.candidates[0].resume_title, "Ana");
        assert_eq!(page.candidates[0].best_score, 75.0);
        assert_eq!(page.candidates[0].best_job_title, "Platform");
        assert_eq!(page.candidates[0].match_count, 2);
        assert_eq!(page.candidates[1].resume_title, "Ben");
        assert_eq!(page.candidates[1].match_count, 1);
    }

    #[tokio::test]
    async fn test_job_scope_and_min_score() {
        let f = fixture().await;
        put(&f, 0, 0, 40.0).await;
        put(&f, 0, 1, 75.0).await;
        put(&f, 1, 0, 60.0).await;

        let page = get_candidates_for_job(&f.store, &f.store, f.owner, f.jobs[0].id, None)
            .await
            .unwrap();
        let scores: Vec<f64> = page.candidates.iter().map(|c| c.best_score).collect();
        assert_eq!(scores, vec![60.0, 40.0]);

        let query = CandidateQuery {
            min_score: Some(50.0),
            ..Default::default()
        };
        let page = list_candidates(&f.store, &f.store, f.owner, &query).await.unwrap();
        assert_eq!(page.total, 2);

        let query = CandidateQuery {
            min_score: Some(101.0),
            ..Default::default()
        };
        assert!(matches!(
            list_candidates(&f.store, &f.store, f.owner, &query).await,
            Err(AppError::InvalidFilterRange(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_job_drops_out_of_candidates() {
        let f = fixture().await;
        put(&f, 0, 1, 75.0).await;
        f.store.soft_delete(f.owner, f.jobs[1].id).await.unwrap();

        let page = list_candidates(&f.store, &f.store, f.owner, &CandidateQuery::default())
            .await
            .unwrap();
        assert!(page.candidates.is_empty());

        let missing = get_candidates_for_job(&f.store, &f.store, f.owner, f.jobs[1].id, None).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_candidate_details() {
        let f = fixture().await;
        put(&f, 0, 0, 40.0).await;
        put(&f, 0, 1, 75.0).await;

        let details = get_candidate_details(&f.store, &f.store, f.owner, f.resumes[0].id)
            .await
            .unwrap();
        assert_eq!(details.best_score, Some(75.0));
        assert_eq!(details.matches.len(), 2);
        assert_eq!(details.resume.sections, vec!["skills"]);

        let job_as_candidate =
            get_candidate_details(&f.store, &f.store, f.owner, f.jobs[0].id).await;
        assert!(matches!(job_as_candidate, Err(AppError::NotFound(_))));

        let stranger =
            get_candidate_details(&f.store, &f.store, Uuid::new_v4(), f.resumes[0].id).await;
        assert!(matches!(stranger, Err(AppError::NotFound(_))));
    }
}
