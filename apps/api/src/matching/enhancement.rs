//! Enhancement Layer: optional LLM assessment blended into the deterministic score.
//!
//! The deterministic `ScoreResult` is always the floor: any enrichment failure (no provider,
//! timeout, transport error, malformed answer) is logged and the base score is returned with
//! `ai_enabled = false`. `enhance` itself never fails.
//!
//! `AppState` holds the provider as `Arc<dyn InsightProvider>` so tests can inject stubs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm_client::{LlmClient, LlmError};
use crate::matching::cache::InsightCache;
use crate::matching::prompts::{assessment_system, build_assessment_prompt};
use crate::matching::similarity::ScoreResult;

pub const DETERMINISTIC_WEIGHT: f64 = 0.7;
pub const AI_WEIGHT: f64 = 0.3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Qualitative assessment returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAssessment {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Deterministic and AI views side by side, persisted with the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedInsights {
    pub ai_score: f64,
    pub base_score: f64,
    pub blended_score: f64,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub risk_flags: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct EnhancedResult {
    /// Deterministic details; `result.score` is the final (possibly blended) score.
    pub result: ScoreResult,
    pub base_score: f64,
    pub ai_enabled: bool,
    pub combined_insights: Option<CombinedInsights>,
}

impl EnhancedResult {
    /// Result for a pair scored without enrichment.
    pub fn deterministic(base: ScoreResult) -> Self {
        Self {
            base_score: base.score,
            result: base,
            ai_enabled: false,
            combined_insights: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error("AI enhancement unavailable: {0}")]
    Unavailable(String),

    #[error("AI enhancement timed out after {0:?}")]
    Timeout(Duration),

    #[error("insight provider failed: {0}")]
    Provider(#[from] LlmError),

    #[error("invalid AI assessment: {0}")]
    InvalidResponse(String),
}

/// Source of qualitative match assessments.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn assess(&self, prompt: &str) -> Result<AiAssessment, LlmError>;
}

#[async_trait]
impl InsightProvider for LlmClient {
    async fn assess(&self, prompt: &str) -> Result<AiAssessment, LlmError> {
        self.complete_json(&assessment_system(), prompt).await
    }
}

#[derive(Clone)]
pub struct Enhancer {
    provider: Option<Arc<dyn InsightProvider>>,
    cache: InsightCache,
    timeout: Duration,
}

impl Enhancer {
    pub fn new(
        provider: Option<Arc<dyn InsightProvider>>,
        cache: InsightCache,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, InsightCache::disabled(), DEFAULT_TIMEOUT)
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Enriches `base` with an AI assessment, falling back to the deterministic score.
    pub async fn enhance(
        &self,
        resume_text: &str,
        job_text: &str,
        base: ScoreResult,
    ) -> EnhancedResult {
        let base_score = base.score;

        match self.assess(resume_text, job_text, &base).await {
            Ok(assessment) => {
                let blended_score = blend_scores(base_score, assessment.score);
                debug!(
                    "AI assessment {} blended {base_score} -> {blended_score}",
                    assessment.score
                );
                let combined = CombinedInsights {
                    ai_score: assessment.score,
                    base_score,
                    blended_score,
                    strengths: assessment.strengths,
                    gaps: assessment.gaps,
                    risk_flags: assessment.risk_flags,
                    summary: assessment.summary,
                };
                EnhancedResult {
                    result: ScoreResult {
                        score: blended_score,
                        ..base
                    },
                    base_score,
                    ai_enabled: true,
                    combined_insights: Some(combined),
                }
            }
            Err(e) => {
                warn!("Falling back to deterministic score {base_score}: {e}");
                EnhancedResult {
                    result: base,
                    base_score,
                    ai_enabled: false,
                    combined_insights: None,
                }
            }
        }
    }

    async fn assess(
        &self,
        resume_text: &str,
        job_text: &str,
        base: &ScoreResult,
    ) -> Result<AiAssessment, EnhancementError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            EnhancementError::Unavailable("no insight provider configured".to_string())
        })?;

        let key = InsightCache::key(resume_text, job_text);
        if let Some(cached) = self.cache.get(&key).await {
            if validate_assessment(&cached).is_ok() {
                return Ok(cached);
            }
        }

        let prompt = build_assessment_prompt(resume_text, job_text, base);
        let assessment = tokio::time::timeout(self.timeout, provider.assess(&prompt))
            .await
            .map_err(|_| EnhancementError::Timeout(self.timeout))??;
        validate_assessment(&assessment)?;

        info!("AI assessment received (score {})", assessment.score);
        self.cache.put(&key, &assessment).await;
        Ok(assessment)
    }
}

fn validate_assessment(assessment: &AiAssessment) -> Result<(), EnhancementError> {
    if !assessment.score.is_finite() || !(0.0..=100.0).contains(&assessment.score) {
        return Err(EnhancementError::InvalidResponse(format!(
            "score {} outside 0-100",
            assessment.score
        )));
    }
    Ok(())
}

/// `0.7 × base + 0.3 × ai`, clamped to [0, 100] and rounded to one decimal.
pub fn blend_scores(base: f64, ai: f64) -> f64 {
    let blended = (DETERMINISTIC_WEIGHT * base + AI_WEIGHT * ai).clamp(0.0, 100.0);
    (blended * 10.0).round() / 10.0
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    fn base() -> ScoreResult {
        ScoreResult {
            score: 60.0,
            matched_keywords: vec!["rust".to_string()],
            missing_keywords: vec!["go".to_string()],
            strengths: vec![],
            recommendations: vec!["Consider highlighting experience with: go".to_string()],
        }
    }

    fn assessment(score: f64) -> AiAssessment {
        AiAssessment {
            score,
            strengths: vec!["Production Rust".to_string()],
            gaps: vec!["No Go".to_string()],
            risk_flags: vec![],
            summary: "Solid backend fit.".to_string(),
        }
    }

    struct FixedProvider {
        score: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InsightProvider for FixedProvider {
        async fn assess(&self, _prompt: &str) -> Result<AiAssessment, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(assessment(self.score))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl InsightProvider for FailingProvider {
        async fn assess(&self, _prompt: &str) -> Result<AiAssessment, LlmError> {
            Err(LlmError::EmptyContent)
        }
    }

    /// Sleeps for 30 s when the prompt mentions a slow resume, otherwise answers at once.
    struct DelayedProvider;

    #[async_trait]
    impl InsightProvider for DelayedProvider {
        async fn assess(&self, prompt: &str) -> Result<AiAssessment, LlmError> {
            if prompt.contains("slow resume") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(assessment(90.0))
        }
    }

    fn enhancer(provider: impl InsightProvider + 'static) -> Enhancer {
        Enhancer::new(Some(Arc::new(provider)), InsightCache::disabled(), DEFAULT_TIMEOUT)
    }

    #[test]
    fn test_blend_weights() {
        assert_eq!(blend_scores(60.0, 80.0), 66.0);
        assert_eq!(blend_scores(67.8, 90.0), 74.5);
        assert_eq!(blend_scores(100.0, 100.0), 100.0);
        assert_eq!(blend_scores(0.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_successful_enhancement_blends() {
        let enhancer = enhancer(FixedProvider {
            score: 80.0,
            calls: AtomicUsize::new(0),
        });
        let out = enhancer.enhance("resume", "job", base()).await;

        assert!(out.ai_enabled);
        assert_eq!(out.base_score, 60.0);
        assert_eq!(out.result.score, 66.0);
        assert_eq!(out.result.matched_keywords, vec!["rust"]);
        let insights = out.combined_insights.unwrap();
        assert_eq!(insights.ai_score, 80.0);
        assert_eq!(insights.blended_score, 66.0);
        assert_eq!(insights.gaps, vec!["No Go"]);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_base() {
        let out = enhancer(FailingProvider).enhance("resume", "job", base()).await;
        assert!(!out.ai_enabled);
        assert_eq!(out.result, base());
        assert!(out.combined_insights.is_none());
    }

    #[tokio::test]
    async fn test_missing_provider_falls_back_to_base() {
        let enhancer = Enhancer::disabled();
        assert!(!enhancer.is_enabled());
        let out = enhancer.enhance("resume", "job", base()).await;
        assert!(!out.ai_enabled);
        assert_eq!(out.result.score, 60.0);
    }

    #[tokio::test]
    async fn test_out_of_range_ai_score_is_rejected() {
        for bad in [150.0, -1.0, f64::NAN] {
            let out = enhancer(FixedProvider {
                score: bad,
                calls: AtomicUsize::new(0),
            })
            .enhance("resume", "job", base())
            .await;
            assert!(!out.ai_enabled, "score {bad} should be rejected");
            assert_eq!(out.result.score, 60.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_base() {
        let started = Instant::now();
        let out = enhancer(DelayedProvider)
            .enhance("slow resume", "job", base())
            .await;
        assert!(!out.ai_enabled);
        assert_eq!(out.result.score, 60.0);
        assert!(started.elapsed() >= DEFAULT_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_enrichment_does_not_block_others() {
        let enhancer = Arc::new(enhancer(DelayedProvider));

        let slow = {
            let enhancer = Arc::clone(&enhancer);
            tokio::spawn(async move { enhancer.enhance("slow resume", "job", base()).await })
        };

        let started = Instant::now();
        let fast = enhancer.enhance("fast resume", "job", base()).await;
        assert!(fast.ai_enabled);
        assert_eq!(fast.result.score, blend_scores(60.0, 90.0));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!slow.is_finished());

        let slow = slow.await.unwrap();
        assert!(!slow.ai_enabled);
    }

    #[test]
    fn test_assessment_tolerates_missing_lists() {
        let parsed: AiAssessment = serde_json::from_str(r#"{"score": 55}"#).unwrap();
        assert_eq!(parsed.score, 55.0);
        assert!(parsed.strengths.is_empty());
        assert!(parsed.summary.is_empty());
    }
}
