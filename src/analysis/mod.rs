//! Client for the external analysis backend.
//!
//! The capture core never touches this; it only produces the transcript
//! text the backend consumes. Summarization, translation and Q&A all happen
//! server-side.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ProcessPayload<'a> {
    transcript: &'a str,
    title: &'a str,
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub translated_summary: Option<String>,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AskPayload<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: &str) -> Self {
        info!("Analysis backend: {}", base_url);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit a transcript for summarization (and optional translation).
    pub async fn process_meeting(
        &self,
        transcript: &str,
        title: &str,
        language: Option<&str>,
    ) -> Result<AnalysisResult> {
        let url = format!("{}/meetings", self.base_url);
        debug!("Submitting {} chars of transcript", transcript.len());

        let response = self
            .client
            .post(&url)
            .json(&ProcessPayload {
                transcript,
                title,
                language,
            })
            .send()
            .await
            .context("Failed to send transcript to analysis backend")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read analysis response body")?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                anyhow::bail!("Analysis backend error: {}", err.error);
            }
            anyhow::bail!("Analysis backend returned status {}: {}", status, body);
        }

        let result: AnalysisResult =
            serde_json::from_str(&body).context("Failed to parse analysis response")?;
        info!("Summary received: {} chars", result.summary.len());
        Ok(result)
    }

    /// Ask a question about the most recently processed meeting.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let url = format!("{}/meetings/current_meeting/ask", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AskPayload { question })
            .send()
            .await
            .context("Failed to send question to analysis backend")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read answer body")?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                anyhow::bail!("Analysis backend error: {}", err.error);
            }
            anyhow::bail!("Analysis backend returned status {}: {}", status, body);
        }

        let parsed: AskResponse =
            serde_json::from_str(&body).context("Failed to parse answer response")?;
        Ok(parsed.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AnalysisClient::new("http://localhost:5000/api/");
        assert_eq!(client.base_url, "http://localhost:5000/api");
    }

    #[test]
    fn test_result_parses_without_translation() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"summary": "short", "meeting_id": "current_meeting"}"#)
                .unwrap();
        assert_eq!(result.summary, "short");
        assert!(result.translated_summary.is_none());
    }

    #[test]
    fn test_result_parses_with_translation() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{"summary": "short", "translated_summary": "kurz"}"#,
        )
        .unwrap();
        assert_eq!(result.translated_summary.as_deref(), Some("kurz"));
    }
}
