//! Redis cache for AI match assessments.
//!
//! Keyed by a SHA-256 of the exact resume and job text, so re-scoring unchanged documents
//! reuses the earlier assessment instead of asking the model again. Every cache failure is
//! logged and treated as a miss.

use std::time::Duration;

use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::matching::enhancement::AiAssessment;

const KEY_PREFIX: &str = "match:insights:v1:";
const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;
/// A slow cache must never cost more than a small slice of the enrichment budget.
const CACHE_OP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct InsightCache {
    client: Option<redis::Client>,
    ttl_secs: u64,
}

impl InsightCache {
    pub fn new(client: Option<redis::Client>) -> Self {
        Self {
            client,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Cache key for one (resume text, job text) pair.
    pub fn key(resume_text: &str, job_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(resume_text.as_bytes());
        hasher.update([0u8]);
        hasher.update(job_text.as_bytes());
        format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, key: &str) -> Option<AiAssessment> {
        let client = self.client.as_ref()?;

        // TODO: hold a redis ConnectionManager in AppState instead of connecting per lookup.
        let lookup = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            conn.get::<_, Option<String>>(key).await
        };

        let raw = match tokio::time::timeout(CACHE_OP_TIMEOUT, lookup).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(e)) => {
                warn!("Insight cache read failed: {e}");
                return None;
            }
            Err(_) => {
                warn!("Insight cache read timed out");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(assessment) => {
                debug!("Insight cache hit for {key}");
                Some(assessment)
            }
            Err(e) => {
                warn!("Discarding unreadable cached assessment {key}: {e}");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, assessment: &AiAssessment) {
        let Some(client) = self.client.as_ref() else {
            return;
        };
        let raw = match serde_json::to_string(assessment) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize assessment for cache: {e}");
                return;
            }
        };

        let store = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            conn.set_ex::<_, _, ()>(key, raw, self.ttl_secs).await
        };

        match tokio::time::timeout(CACHE_OP_TIMEOUT, store).await {
            Ok(Ok(())) => debug!("Cached assessment {key}"),
            Ok(Err(e)) => warn!("Insight cache write failed: {e}"),
            Err(_) => warn!("Insight cache write timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_prefixed() {
        let a = InsightCache::key("resume", "job");
        let b = InsightCache::key("resume", "job");
        assert_eq!(a, b);
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_key_separates_fields() {
        assert_ne!(InsightCache::key("ab", "c"), InsightCache::key("a", "bc"));
        assert_ne!(InsightCache::key("resume", "job"), InsightCache::key("job", "resume"));
    }

    #[tokio::test]
    async fn test_disabled_cache_misses_silently() {
        let cache = InsightCache::disabled();
        let assessment = AiAssessment {
            score: 50.0,
            strengths: vec![],
            gaps: vec![],
            risk_flags: vec![],
            summary: String::new(),
        };
        cache.put("k", &assessment).await;
        assert_eq!(cache.get("k").await, None);
    }
}
