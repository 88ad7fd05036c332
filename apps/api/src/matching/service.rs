//! Match Service: scores pairs, enriches them and writes the results.
//!
//! Batch runs fan out through `buffer_unordered`, bounded by `AI_ENHANCEMENT_CONCURRENCY`.
//! Each pair owns its enrichment timeout, so one slow assessment only delays itself.

use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::enhancement::{EnhancedResult, Enhancer};
use crate::matching::require_document;
use crate::matching::similarity::{score, score_with_corpus, CorpusStats, IdfScope};
use crate::models::{Document, DocumentKind, MatchRecord};
use crate::store::{DocumentStore, MatchStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MatchOptions {
    /// Request AI enrichment; ignored when no provider is configured.
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
    #[serde(default)]
    pub idf_scope: IdfScope,
}

fn default_use_ai() -> bool {
    true
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            use_ai: default_use_ai(),
            idf_scope: IdfScope::Pair,
        }
    }
}

#[derive(Clone)]
pub struct MatchService {
    documents: Arc<dyn DocumentStore>,
    matches: Arc<dyn MatchStore>,
    enhancer: Enhancer,
    concurrency: usize,
}

impl MatchService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        matches: Arc<dyn MatchStore>,
        enhancer: Enhancer,
        concurrency: usize,
    ) -> Self {
        Self {
            documents,
            matches,
            enhancer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.enhancer.is_enabled()
    }

    /// Scores one resume against one job and stores the result.
    pub async fn compute_match(
        &self,
        owner_id: Uuid,
        resume_id: Uuid,
        job_id: Uuid,
        options: MatchOptions,
    ) -> Result<MatchRecord, AppError> {
        let resume =
            require_document(self.documents.as_ref(), owner_id, resume_id, DocumentKind::Resume)
                .await?;
        let job = require_document(self.documents.as_ref(), owner_id, job_id, DocumentKind::Job)
            .await?;

        self.score_pair(owner_id, &resume, &job, None, options.use_ai)
            .await
    }

    /// Scores every active resume of the owner against one job.
    pub async fn match_job(
        &self,
        owner_id: Uuid,
        job_id: Uuid,
        options: MatchOptions,
    ) -> Result<Vec<MatchRecord>, AppError> {
        let job = require_document(self.documents.as_ref(), owner_id, job_id, DocumentKind::Job)
            .await?;
        let resumes = self
            .documents
            .list_active(owner_id, DocumentKind::Resume)
            .await?;

        let corpus = (options.idf_scope == IdfScope::Batch).then(|| {
            CorpusStats::for_batch(
                &job.features,
                &job.raw_text,
                resumes.iter().map(|r| &r.features),
            )
        });
        let pairs = resumes.iter().map(|resume| (resume, &job)).collect();

        let records = self
            .run_batch(owner_id, pairs, corpus.as_ref(), options.use_ai)
            .await?;
        info!(
            "Scored {} resumes against job {job_id} ({} AI-enhanced)",
            records.len(),
            records.iter().filter(|r| r.ai_enabled).count()
        );
        Ok(records)
    }

    /// Scores one resume against every active job of the owner.
    pub async fn match_resume(
        &self,
        owner_id: Uuid,
        resume_id: Uuid,
        options: MatchOptions,
    ) -> Result<Vec<MatchRecord>, AppError> {
        let resume =
            require_document(self.documents.as_ref(), owner_id, resume_id, DocumentKind::Resume)
                .await?;
        let jobs = self.documents.list_active(owner_id, DocumentKind::Job).await?;

        let corpus = (options.idf_scope == IdfScope::Batch).then(|| {
            CorpusStats::for_resume_batch(
                &resume.features,
                jobs.iter().map(|j| (&j.features, j.raw_text.as_str())),
            )
        });
        let pairs = jobs.iter().map(|job| (&resume, job)).collect();

        let records = self
            .run_batch(owner_id, pairs, corpus.as_ref(), options.use_ai)
            .await?;
        info!(
            "Scored resume {resume_id} against {} jobs ({} AI-enhanced)",
            records.len(),
            records.iter().filter(|r| r.ai_enabled).count()
        );
        Ok(records)
    }

    async fn run_batch(
        &self,
        owner_id: Uuid,
        pairs: Vec<(&Document, &Document)>,
        corpus: Option<&CorpusStats>,
        use_ai: bool,
    ) -> Result<Vec<MatchRecord>, AppError> {
        // Boxed up front so the batch future is `Send` for every borrow it holds.
        let pending: Vec<BoxFuture<'_, Result<MatchRecord, AppError>>> = pairs
            .into_iter()
            .map(|(resume, job)| {
                self.score_pair(owner_id, resume, job, corpus, use_ai)
                    .boxed()
            })
            .collect();

        let mut records: Vec<MatchRecord> = stream::iter(pending)
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        records.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.resume_id.cmp(&b.resume_id))
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(records)
    }

    async fn score_pair(
        &self,
        owner_id: Uuid,
        resume: &Document,
        job: &Document,
        corpus: Option<&CorpusStats>,
        use_ai: bool,
    ) -> Result<MatchRecord, AppError> {
        let started = Instant::now();
        // Stamped at the start so a slow computation never replaces a newer one.
        let created_at = Utc::now();

        let base = match corpus {
            Some(corpus) => {
                score_with_corpus(&resume.features, &job.features, &job.raw_text, corpus)
            }
            None => score(&resume.features, &job.features, &job.raw_text),
        };

        let enhanced = if use_ai && self.enhancer.is_enabled() {
            self.enhancer
                .enhance(&resume.raw_text, &job.raw_text, base)
                .await
        } else {
            EnhancedResult::deterministic(base)
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let record = MatchRecord::from_enhanced(
            owner_id, resume.id, job.id, enhanced, elapsed_ms, created_at,
        );
        Ok(self.matches.upsert(record).await?)
    }
}
