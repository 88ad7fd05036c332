//! Similarity Scorer: TF-IDF weighted cosine similarity between a resume and a job.
//!
//! Algorithm:
//! 1. Term counts: resume from its `FeatureSet`, job from its full text (job keywords the
//!    text does not contain count once).
//! 2. TF = count / document length.
//! 3. IDF = ln((1 + N) / (1 + df)) + 1 over the corpus. Single pairs use the two-document
//!    corpus {resume, job} so a pair scores the same regardless of batch context; batch
//!    scoring may pass an accumulated `CorpusStats` instead.
//! 4. score = cosine(tf·idf vectors) × 100, rounded to one decimal.
//!
//! Vectors are walked in sorted vocabulary order so results are reproducible bit-for-bit.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::matching::features::{count_terms, tokenize, FeatureSet};

/// Section overlap (share of job keywords found in one resume section) reported as a strength.
const STRONG_SECTION_OVERLAP: f64 = 0.3;
/// Overall keyword coverage reported as a strength.
const STRONG_COVERAGE: f64 = 0.5;
/// Scores below this get tailoring advice.
const LOW_SCORE: f64 = 40.0;
const MAX_LISTED_MISSING: usize = 5;

/// Deterministic scoring output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0.0 – 100.0, one decimal.
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ScoreResult {
    fn empty() -> Self {
        Self {
            score: 0.0,
            matched_keywords: vec![],
            missing_keywords: vec![],
            strengths: vec![],
            recommendations: vec![],
        }
    }
}

/// Which corpus the IDF term is computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdfScope {
    /// Two-document corpus {resume, job}; reproducible per pair.
    #[default]
    Pair,
    /// The job plus every resume in the batch being scored.
    Batch,
}

/// Document-frequency statistics for IDF.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    documents: usize,
    document_frequency: HashMap<String, usize>,
}

impl CorpusStats {
    /// Registers one document given its distinct terms.
    pub fn add_document<'a>(&mut self, terms: impl IntoIterator<Item = &'a String>) {
        self.documents += 1;
        for term in terms {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
    }

    /// Corpus over a job and all resumes scored against it in one batch.
    pub fn for_batch<'a>(
        job: &FeatureSet,
        job_text: &str,
        resumes: impl IntoIterator<Item = &'a FeatureSet>,
    ) -> Self {
        let mut corpus = Self::default();
        corpus.add_document(job_term_counts(job, job_text).keys());
        for resume in resumes {
            corpus.add_document(resume_term_counts(resume).keys());
        }
        corpus
    }

    /// Corpus over a resume and every job it is scored against in one batch.
    pub fn for_resume_batch<'a>(
        resume: &FeatureSet,
        jobs: impl IntoIterator<Item = (&'a FeatureSet, &'a str)>,
    ) -> Self {
        let mut corpus = Self::default();
        corpus.add_document(resume_term_counts(resume).keys());
        for (job, job_text) in jobs {
            corpus.add_document(job_term_counts(job, job_text).keys());
        }
        corpus
    }

    /// Smoothed IDF; never zero, so shared terms still contribute to the cosine.
    pub fn idf(&self, term: &str) -> f64 {
        let df = self.document_frequency.get(term).copied().unwrap_or(0);
        ((1.0 + self.documents as f64) / (1.0 + df as f64)).ln() + 1.0
    }
}

/// Scores one resume against one job using the two-document corpus.
pub fn score(resume: &FeatureSet, job: &FeatureSet, job_text: &str) -> ScoreResult {
    let resume_counts = resume_term_counts(resume);
    let job_counts = job_term_counts(job, job_text);

    let mut corpus = CorpusStats::default();
    corpus.add_document(resume_counts.keys());
    corpus.add_document(job_counts.keys());

    score_counts(resume, &resume_counts, &job_counts, &corpus)
}

/// Scores one resume against one job with caller-supplied corpus statistics.
pub fn score_with_corpus(
    resume: &FeatureSet,
    job: &FeatureSet,
    job_text: &str,
    corpus: &CorpusStats,
) -> ScoreResult {
    let resume_counts = resume_term_counts(resume);
    let job_counts = job_term_counts(job, job_text);
    score_counts(resume, &resume_counts, &job_counts, corpus)
}

fn resume_term_counts(features: &FeatureSet) -> BTreeMap<String, u32> {
    let mut counts: BTreeMap<String, u32> = features
        .term_counts
        .iter()
        .filter(|&(_, &n)| n > 0)
        .map(|(t, &n)| (t.clone(), n))
        .collect();
    for keyword in &features.keywords {
        counts.entry(keyword.clone()).or_insert(1);
    }
    counts
}

fn job_term_counts(job: &FeatureSet, job_text: &str) -> BTreeMap<String, u32> {
    let mut counts = count_terms(job_text);
    if counts.is_empty() {
        return resume_term_counts(job);
    }
    for keyword in &job.keywords {
        counts.entry(keyword.clone()).or_insert(1);
    }
    counts
}

fn score_counts(
    resume: &FeatureSet,
    resume_counts: &BTreeMap<String, u32>,
    job_counts: &BTreeMap<String, u32>,
    corpus: &CorpusStats,
) -> ScoreResult {
    if job_counts.is_empty() {
        return ScoreResult::empty();
    }

    let cosine = cosine_similarity(resume_counts, job_counts, corpus);
    let score = ((cosine * 1000.0).round() / 10.0).clamp(0.0, 100.0);

    let ranked_job_keywords = rank_by_frequency(job_counts);
    let (matched_keywords, missing_keywords): (Vec<String>, Vec<String>) = ranked_job_keywords
        .into_iter()
        .partition(|k| resume_counts.contains_key(k));

    let strengths = build_strengths(resume, job_counts, matched_keywords.len());
    let recommendations = build_recommendations(resume, score, &missing_keywords);

    ScoreResult {
        score,
        matched_keywords,
        missing_keywords,
        strengths,
        recommendations,
    }
}

fn cosine_similarity(
    a: &BTreeMap<String, u32>,
    b: &BTreeMap<String, u32>,
    corpus: &CorpusStats,
) -> f64 {
    let total_a: u32 = a.values().sum();
    let total_b: u32 = b.values().sum();
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    let vocabulary: BTreeSet<&String> = a.keys().chain(b.keys()).collect();

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for term in vocabulary {
        let idf = corpus.idf(term);
        let wa = tf(a, term, total_a) * idf;
        let wb = tf(b, term, total_b) * idf;
        dot += wa * wb;
        norm_a += wa * wa;
        norm_b += wb * wb;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if cosine.is_finite() {
        cosine
    } else {
        0.0
    }
}

fn tf(counts: &BTreeMap<String, u32>, term: &str, total: u32) -> f64 {
    f64::from(counts.get(term).copied().unwrap_or(0)) / f64::from(total)
}

/// Descending job frequency, then alphabetical.
fn rank_by_frequency(counts: &BTreeMap<String, u32>) -> Vec<String> {
    let mut ranked: Vec<(&String, u32)> = counts.iter().map(|(t, &n)| (t, n)).collect();
    ranked.sort_by(|(ta, na), (tb, nb)| nb.cmp(na).then_with(|| ta.cmp(tb)));
    ranked.into_iter().map(|(t, _)| t.clone()).collect()
}

fn build_strengths(
    resume: &FeatureSet,
    job_counts: &BTreeMap<String, u32>,
    matched: usize,
) -> Vec<String> {
    let total = job_counts.len();
    let mut strengths = Vec::new();

    if matched as f64 / total as f64 >= STRONG_COVERAGE {
        strengths.push(format!("Covers {matched} of {total} job keywords"));
    }

    for (section, text) in &resume.sections {
        let section_terms: BTreeSet<String> = tokenize(text).into_iter().collect();
        let overlap = job_counts
            .keys()
            .filter(|k| section_terms.contains(*k))
            .count();
        if overlap as f64 / total as f64 >= STRONG_SECTION_OVERLAP {
            strengths.push(format!("Strong keyword overlap in {section} section"));
        }
    }

    strengths
}

fn build_recommendations(resume: &FeatureSet, score: f64, missing: &[String]) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !missing.is_empty() {
        let top: Vec<&str> = missing
            .iter()
            .take(MAX_LISTED_MISSING)
            .map(String::as_str)
            .collect();
        recommendations.push(format!(
            "Consider highlighting experience with: {}",
            top.join(", ")
        ));
    }
    if !resume.sections.contains_key("skills") {
        recommendations
            .push("Add a dedicated skills section so key technologies are easy to find".to_string());
    }
    if score < LOW_SCORE {
        recommendations.push(format!(
            "Low match ({score:.1}/100). Tailor the resume to the job description before applying."
        ));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::features::extract_features;

    const RESUME: &str = "JavaScript, React, Node.js, 5 years experience";
    const JOB: &str = "Senior Full Stack Developer\nRequirements:\nJavaScript, TypeScript, Node.js, React\n5+ years of professional experience with JavaScript, React and Node.js";

    fn job_keyword_set(job: &FeatureSet, job_text: &str) -> BTreeSet<String> {
        job_term_counts(job, job_text).into_keys().collect()
    }

    #[test]
    fn test_example_scenario() {
        let resume = extract_features(RESUME);
        let job = extract_features(JOB);
        let result = score(&resume, &job, JOB);

        assert_eq!(result.score, 67.8);
        assert_eq!(
            result.matched_keywords,
            vec!["javascript", "node.js", "react", "experience", "years"]
        );
        assert_eq!(
            result.missing_keywords,
            vec![
                "developer",
                "full",
                "professional",
                "requirements",
                "senior",
                "stack",
                "typescript"
            ]
        );
    }

    #[test]
    fn test_scores_are_bit_for_bit_reproducible() {
        let resume = extract_features(RESUME);
        let job = extract_features(JOB);
        let a = score(&resume, &job, JOB);
        let b = score(&resume, &job, JOB);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_self_similarity_is_100() {
        let features = extract_features(JOB);
        assert_eq!(score(&features, &features, JOB).score, 100.0);
        assert_eq!(score(&features, &features, "").score, 100.0);
    }

    #[test]
    fn test_empty_resume_scores_zero() {
        let job = extract_features(JOB);
        let result = score(&FeatureSet::default(), &job, JOB);
        assert_eq!(result.score, 0.0);
        assert!(result.matched_keywords.is_empty());
        assert_eq!(result.missing_keywords.len(), job_keyword_set(&job, JOB).len());
    }

    #[test]
    fn test_empty_job_scores_zero() {
        let resume = extract_features(RESUME);
        let result = score(&resume, &FeatureSet::default(), "");
        assert_eq!(result.score, 0.0);
        assert!(!result.score.is_nan());
        assert!(result.matched_keywords.is_empty());
        assert!(result.missing_keywords.is_empty());
    }

    #[test]
    fn test_disjoint_documents_score_zero() {
        let resume = extract_features("Welding, carpentry, plumbing");
        let job = extract_features("Rust compiler engineer");
        assert_eq!(score(&resume, &job, "Rust compiler engineer").score, 0.0);
    }

    #[test]
    fn test_matched_and_missing_partition_job_keywords() {
        let pairs = [
            (RESUME, JOB),
            ("Rust, Go, Kubernetes", "Kubernetes operator in Go; Terraform a plus"),
            ("", "Python"),
            ("Everything here", ""),
        ];
        for (resume_text, job_text) in pairs {
            let resume = extract_features(resume_text);
            let job = extract_features(job_text);
            let result = score(&resume, &job, job_text);

            let matched: BTreeSet<String> = result.matched_keywords.iter().cloned().collect();
            let missing: BTreeSet<String> = result.missing_keywords.iter().cloned().collect();
            assert!(matched.is_disjoint(&missing));
            let union: BTreeSet<String> = matched.union(&missing).cloned().collect();
            assert_eq!(union, job_keyword_set(&job, job_text), "pair {resume_text:?}");
        }
    }

    #[test]
    fn test_job_keywords_missing_from_text_still_count() {
        let resume = extract_features("Rust");
        let mut job = extract_features("Go developer");
        job.keywords.insert("rust".to_string());
        let result = score(&resume, &job, "Go developer");
        assert_eq!(result.matched_keywords, vec!["rust"]);
        assert!(result.score > 0.0);
    }

    #[test]
    fn test_keywords_without_term_counts_are_weighted_once() {
        let mut resume = FeatureSet::default();
        resume.keywords.insert("rust".to_string());
        let job = extract_features("Rust");
        assert_eq!(score(&resume, &job, "Rust").score, 100.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let resume = extract_features("Rust Rust Rust Go");
        let job = extract_features("Rust Go Go Go Kafka");
        let result = score(&resume, &job, "Rust Go Go Go Kafka");
        assert!((0.0..=100.0).contains(&result.score));
    }

    #[test]
    fn test_section_strengths_and_recommendations() {
        let resume_text = "SKILLS\nRust, Kubernetes, PostgreSQL\nEDUCATION\nBSc";
        let job_text = "Rust engineer with Kubernetes and PostgreSQL";
        let resume = extract_features(resume_text);
        let job = extract_features(job_text);
        let result = score(&resume, &job, job_text);

        assert!(result
            .strengths
            .contains(&"Covers 3 of 4 job keywords".to_string()));
        assert!(result
            .strengths
            .contains(&"Strong keyword overlap in skills section".to_string()));
        assert!(!result
            .strengths
            .iter()
            .any(|s| s.contains("education section")));
        assert_eq!(
            result.recommendations,
            vec!["Consider highlighting experience with: engineer".to_string()]
        );
    }

    #[test]
    fn test_low_score_recommendations() {
        let resume = extract_features("Welding");
        let job = extract_features("Rust engineer");
        let result = score(&resume, &job, "Rust engineer");
        assert_eq!(result.recommendations.len(), 3);
        assert!(result.recommendations[2].starts_with("Low match (0.0/100)"));
    }

    #[test]
    fn test_batch_corpus_changes_idf() {
        let job_text = "Rust Kubernetes";
        let job = extract_features(job_text);
        let a = extract_features("Rust");
        let b = extract_features("Rust Go");
        let c = extract_features("Kubernetes");

        let corpus = CorpusStats::for_batch(&job, job_text, [&a, &b, &c]);
        // Four documents: an unseen term gets ln(5) + 1.
        assert!((corpus.idf("haskell") - (5.0f64.ln() + 1.0)).abs() < 1e-12);
        assert!(corpus.idf("kubernetes") > corpus.idf("rust"));

        // Rare "kubernetes" outweighs common "rust" in the batch corpus.
        let batch_a = score_with_corpus(&a, &job, job_text, &corpus).score;
        let batch_c = score_with_corpus(&c, &job, job_text, &corpus).score;
        assert!(batch_c > batch_a);

        // Per-pair both are symmetric single-term overlaps.
        assert_eq!(score(&a, &job, job_text).score, score(&c, &job, job_text).score);
    }

    #[test]
    fn test_idf_never_zero() {
        let mut corpus = CorpusStats::default();
        let terms = vec!["rust".to_string()];
        corpus.add_document(&terms);
        corpus.add_document(&terms);
        assert!((corpus.idf("rust") - 1.0).abs() < f64::EPSILON);
        assert!(corpus.idf("unseen") > 1.0);
    }
}
