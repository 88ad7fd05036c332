//! Feature Extractor: keywords, term counts and a coarse section map from extracted text.
//!
//! Pure and deterministic: ordered containers only, so identical text always yields an
//! identical `FeatureSet` (and identical serialized JSON).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Section that absorbs text appearing before the first recognized heading.
pub const IMPLICIT_SECTION: &str = "summary";

/// Characters that may appear inside a token (`node.js`, `c++`, `c#`, `ci-cd`).
const TOKEN_JOINERS: &[char] = &['.', '+', '#', '-'];
const LEADING_TRIM: &[char] = &['.', '-', '+', '#'];
const TRAILING_TRIM: &[char] = &['.', '-'];

const MIN_TOKEN_CHARS: usize = 2;
const MAX_HEADING_WORDS: usize = 4;
const MAX_HEADING_CHARS: usize = 40;

/// Standard English stop words.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "etc",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "must", "my", "myself", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over",
    "own", "per", "same", "shall", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "us", "very", "via", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "within",
    "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Heading aliases → canonical section name.
const SECTION_ALIASES: &[(&str, &str)] = &[
    ("summary", "summary"),
    ("professional summary", "summary"),
    ("profile", "summary"),
    ("professional profile", "summary"),
    ("objective", "summary"),
    ("career objective", "summary"),
    ("about me", "summary"),
    ("experience", "experience"),
    ("work experience", "experience"),
    ("professional experience", "experience"),
    ("employment", "experience"),
    ("employment history", "experience"),
    ("work history", "experience"),
    ("education", "education"),
    ("academic background", "education"),
    ("education and training", "education"),
    ("skills", "skills"),
    ("technical skills", "skills"),
    ("core competencies", "skills"),
    ("key skills", "skills"),
    ("technologies", "skills"),
    ("projects", "projects"),
    ("personal projects", "projects"),
    ("certifications", "certifications"),
    ("certificates", "certifications"),
    ("licenses and certifications", "certifications"),
    ("awards", "awards"),
    ("publications", "publications"),
    ("languages", "languages"),
    ("requirements", "requirements"),
    ("qualifications", "requirements"),
    ("minimum qualifications", "requirements"),
    ("preferred qualifications", "requirements"),
    ("what you bring", "requirements"),
    ("responsibilities", "responsibilities"),
    ("key responsibilities", "responsibilities"),
    ("what you will do", "responsibilities"),
    ("about the role", "responsibilities"),
    ("benefits", "benefits"),
];

/// Words allowed to stay lower-case inside a title-case heading.
const HEADING_CONNECTORS: &[&str] = &["and", "of", "&", "the", "you", "will"];

/// Structured signal derived from one text revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keywords: BTreeSet<String>,
    pub sections: BTreeMap<String, String>,
    pub word_count: usize,
    /// Token frequencies behind `keywords`; lets the scorer weight terms without re-tokenizing.
    #[serde(default)]
    pub term_counts: BTreeMap<String, u32>,
}

/// Derives the full feature set for `text`.
pub fn extract_features(text: &str) -> FeatureSet {
    let term_counts = count_terms(text);
    let keywords = term_counts.keys().cloned().collect();

    FeatureSet {
        keywords,
        sections: detect_sections(text),
        word_count: text.split_whitespace().count(),
        term_counts,
    }
}

/// Lower-cased, punctuation-stripped tokens with stop words and short or numeric tokens removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || TOKEN_JOINERS.contains(&c)))
        .filter_map(normalize_token)
        .collect()
}

/// Counts surviving tokens.
pub fn count_terms(text: &str) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim_start_matches(LEADING_TRIM)
        .trim_end_matches(TRAILING_TRIM);
    let token = trimmed.to_lowercase();

    // Tokens need at least one letter: "10" and "5+" are dropped.
    if token.chars().count() < MIN_TOKEN_CHARS
        || !token.chars().any(char::is_alphabetic)
        || is_stop_word(&token)
    {
        return None;
    }
    Some(token)
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Splits line-oriented text into canonical sections keyed by heading.
fn detect_sections(text: &str) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current = IMPLICIT_SECTION;

    for line in text.lines() {
        if let Some(section) = detect_heading(line) {
            current = section;
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let body = sections.entry(current.to_string()).or_default();
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(line);
    }

    sections
}

/// Returns the canonical section name when `line` looks like a known heading.
fn detect_heading(line: &str) -> Option<&'static str> {
    let candidate = line.trim().trim_end_matches(':').trim();
    if candidate.is_empty() || candidate.chars().count() > MAX_HEADING_CHARS {
        return None;
    }

    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.len() > MAX_HEADING_WORDS || !is_heading_case(candidate, &words) {
        return None;
    }

    let normalized = words.join(" ").to_lowercase();
    SECTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
}

fn is_heading_case(candidate: &str, words: &[&str]) -> bool {
    let upper = candidate.chars().any(char::is_alphabetic) && candidate == candidate.to_uppercase();
    let title = words.iter().all(|w| {
        HEADING_CONNECTORS.contains(w)
            || w.chars()
                .find(|c| c.is_alphabetic())
                .is_some_and(char::is_uppercase)
    });
    upper || title
}
