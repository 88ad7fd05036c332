// LLM prompts for match enrichment.

use crate::matching::similarity::ScoreResult;

const JSON_ONLY: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Upper bound on resume / job text sent to the model, in characters.
pub const MAX_EXCERPT_CHARS: usize = 4_000;
const MAX_PROMPT_KEYWORDS: usize = 25;

/// System prompt for match assessment.
pub fn assessment_system() -> String {
    format!(
        "You are an experienced technical recruiter assessing how well a candidate's resume \
         fits a job description. {JSON_ONLY}"
    )
}

const ASSESSMENT_SCHEMA: &str = r#"Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 72,
  "strengths": ["Five years of production React experience"],
  "gaps": ["No TypeScript mentioned"],
  "risk_flags": ["Short tenures at last two employers"],
  "summary": "One or two sentences."
}

Rules:
- "score" is your own 0-100 fit estimate, independent of the keyword score.
- At most 5 entries in each list. Each entry under 20 words.
- Only cite facts present in the resume. Do NOT invent experience.
- "risk_flags" is for concrete concerns (gaps in employment, missing hard requirements), otherwise []."#;

/// Builds the bounded assessment prompt from resume / job excerpts and the deterministic result.
pub fn build_assessment_prompt(resume_text: &str, job_text: &str, base: &ScoreResult) -> String {
    let matched = keyword_list(&base.matched_keywords);
    let missing = keyword_list(&base.missing_keywords);

    format!(
        "Assess the candidate below against the job description.\n\n\
         {ASSESSMENT_SCHEMA}\n\n\
         Keyword score (TF-IDF cosine, 0-100): {score:.1}\n\
         Matched keywords: {matched}\n\
         Missing keywords: {missing}\n\n\
         <job_description>\n{job}\n</job_description>\n\n\
         <resume>\n{resume}\n</resume>",
        score = base.score,
        job = excerpt(job_text, MAX_EXCERPT_CHARS),
        resume = excerpt(resume_text, MAX_EXCERPT_CHARS),
    )
}

fn keyword_list(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return "(none)".to_string();
    }
    keywords
        .iter()
        .take(MAX_PROMPT_KEYWORDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncates to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ScoreResult {
        ScoreResult {
            score: 61.24,
            matched_keywords: vec!["rust".to_string(), "kafka".to_string()],
            missing_keywords: vec![],
            strengths: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "ééééé";
        assert_eq!(excerpt(text, 3), "ééé");
        assert_eq!(excerpt(text, 10), text);
        assert_eq!(excerpt("  padded  ", 100), "padded");
    }

    #[test]
    fn test_prompt_is_bounded() {
        let resume = "r".repeat(MAX_EXCERPT_CHARS * 3);
        let job = "j".repeat(MAX_EXCERPT_CHARS * 3);
        let prompt = build_assessment_prompt(&resume, &job, &base());
        assert!(prompt.len() < MAX_EXCERPT_CHARS * 2 + 2_000);
        assert!(prompt.contains(&"r".repeat(MAX_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"r".repeat(MAX_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn test_prompt_includes_deterministic_result() {
        let prompt = build_assessment_prompt("resume", "job", &base());
        assert!(prompt.contains("Keyword score (TF-IDF cosine, 0-100): 61.2"));
        assert!(prompt.contains("Matched keywords: rust, kafka"));
        assert!(prompt.contains("Missing keywords: (none)"));
    }

    #[test]
    fn test_system_prompt_demands_json() {
        assert!(assessment_system().contains("valid JSON only"));
    }
}
