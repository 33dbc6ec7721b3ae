//! LLM match clients.
//!
//! [`GeminiClient`] talks to the Gemini generateContent endpoint and asks
//! for JSON output; [`MockMatchClient`] is the offline fallback. The
//! provider is picked from the environment at boot.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use scout_core::error::AppError;
use scout_core::models::{CandidateProfile, JobMatch};
use scout_core::traits::Matcher;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini-backed job matcher.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

// ---- Gemini API types ----

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    code: u16,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn call(&self, prompt: String) -> Result<String, AppError> {
        let url = format!(
            "{GEMINI_BASE_URL}/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            // Low temperature for consistent JSON output.
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 500,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(30)
                } else {
                    AppError::LlmError {
                        message: e.to_string(),
                        status_code: 0,
                        retryable: true,
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("failed to read LLM response: {e}")))?;

        let decoded: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::LlmError {
                message: format!("unexpected response shape: {e}"),
                status_code: status,
                retryable: false,
            }
        })?;

        if let Some(error) = decoded.error {
            return Err(AppError::LlmError {
                message: error.message,
                status_code: error.code,
                retryable: error.code == 429 || error.code >= 500,
            });
        }

        decoded
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| AppError::LlmError {
                message: "empty response".into(),
                status_code: status,
                retryable: false,
            })
    }
}

impl Matcher for GeminiClient {
    async fn match_job(
        &self,
        title: &str,
        description: &str,
        profile: &CandidateProfile,
    ) -> Result<JobMatch, AppError> {
        let tech_stack = profile.tech_stack.join(", ");
        let prompt = format!(
            r#"You are a job matching assistant.

Analyze how well this job matches the candidate's profile and return a JSON score.

Return JSON only with this exact structure:
{{
  "match_score": number from 0 to 100,
  "strengths": ["strength1", "strength2"],
  "weaknesses": ["weakness1"],
  "short_summary": "one sentence summary"
}}

Rules:
- match_score: 90-100 = excellent fit, 70-89 = good fit, 50-69 = partial fit, below 50 = poor fit
- Focus on Go/Golang, backend, and the candidate's tech stack
- strengths: what makes this a good match (max 3 items)
- weaknesses: what might be missing (max 2 items)
- short_summary: one sentence (max 20 words)

Candidate's Tech Stack: {tech_stack}

Job Title: {title}

Job Description:
{}"#,
            truncate(description, 800)
        );

        let response = self.call(prompt).await?;
        serde_json::from_str(strip_json_fences(&response)).map_err(|e| AppError::LlmError {
            message: format!("invalid match JSON: {e} (response: {response})"),
            status_code: 200,
            retryable: false,
        })
    }
}

/// Offline matcher used when no API key is configured.
///
/// Scores vary deterministically with the title so repeated runs are
/// stable and lists still get a spread of values.
#[derive(Clone, Default)]
pub struct MockMatchClient;

impl MockMatchClient {
    pub fn new() -> Self {
        Self
    }
}

impl Matcher for MockMatchClient {
    async fn match_job(
        &self,
        title: &str,
        _description: &str,
        _profile: &CandidateProfile,
    ) -> Result<JobMatch, AppError> {
        let score = 70 + (fingerprint(title) % 30) as i32;
        Ok(JobMatch {
            match_score: score,
            strengths: vec!["Golang".into(), "Backend".into()],
            weaknesses: vec!["Unknown stack".into()],
            short_summary: format!("Mock match score: {score}"),
        })
    }
}

/// Provider selection, auto-detected from the environment:
/// `AI_PROVIDER` forces a choice; otherwise a present `GEMINI_API_KEY`
/// selects Gemini and the mock is the fallback.
#[derive(Clone)]
pub enum MatchClient {
    Gemini(GeminiClient),
    Mock(MockMatchClient),
}

impl MatchClient {
    pub fn from_env() -> Result<Self, AppError> {
        let provider = std::env::var("AI_PROVIDER")
            .unwrap_or_default()
            .to_lowercase();
        let gemini_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();

        let provider = if provider.is_empty() {
            if gemini_key.is_empty() { "mock" } else { "gemini" }.to_string()
        } else {
            provider
        };

        match provider.as_str() {
            "gemini" if !gemini_key.is_empty() => {
                tracing::info!("using Gemini match client");
                Ok(MatchClient::Gemini(GeminiClient::new(gemini_key)?))
            }
            "gemini" => {
                tracing::warn!("AI_PROVIDER=gemini but GEMINI_API_KEY not set, using mock");
                Ok(MatchClient::Mock(MockMatchClient::new()))
            }
            _ => {
                tracing::info!("using mock match client (set GEMINI_API_KEY for real scoring)");
                Ok(MatchClient::Mock(MockMatchClient::new()))
            }
        }
    }
}

impl Matcher for MatchClient {
    async fn match_job(
        &self,
        title: &str,
        description: &str,
        profile: &CandidateProfile,
    ) -> Result<JobMatch, AppError> {
        match self {
            MatchClient::Gemini(client) => client.match_job(title, description, profile).await,
            MatchClient::Mock(client) => client.match_job(title, description, profile).await,
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Strip markdown code fences some models wrap JSON in.
fn strip_json_fences(s: &str) -> &str {
    s.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn fingerprint(s: &str) -> u64 {
    // xorshift over a simple byte fold, good enough to spread mock scores.
    let mut x = s
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100_0000_01b3)
        })
        .max(1);
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_code_fences() {
        assert_eq!(
            strip_json_fences("```json\n{\"match_score\": 80}\n```"),
            "{\"match_score\": 80}"
        );
        assert_eq!(strip_json_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }

    #[tokio::test]
    async fn mock_scores_are_stable_and_in_range() {
        let client = MockMatchClient::new();
        let profile = CandidateProfile::default();
        let a = client.match_job("Backend Engineer", "", &profile).await.unwrap();
        let b = client.match_job("Backend Engineer", "", &profile).await.unwrap();
        assert_eq!(a.match_score, b.match_score);
        assert!((70..100).contains(&a.match_score));
        assert!(!a.short_summary.is_empty());
    }

    #[test]
    fn match_json_parses_into_job_match() {
        let verdict: JobMatch = serde_json::from_str(
            r#"{"match_score": 85, "strengths": ["Go"], "weaknesses": [], "short_summary": "Good fit"}"#,
        )
        .unwrap();
        assert_eq!(verdict.match_score, 85);
        assert_eq!(verdict.short_summary, "Good fit");
    }
}
