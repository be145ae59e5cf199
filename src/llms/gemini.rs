//! Google Gemini streaming client.
//!
//! Talks to the `streamGenerateContent` endpoint with `alt=sse` and feeds
//! candidate text parts into the caller's channel as they arrive.

use std::io::{BufRead, BufReader};
use std::sync::mpsc::Sender;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{GenerationRequest, LlmClient, LlmError, StreamEvent};
use crate::constants::{GEMINI_API_BASE, MAX_OUTPUT_TOKENS, MODEL, STATE_DIR, TEMPERATURE};
use crate::keys::KeyStore;

/// Gemini client
pub struct GeminiClient {
    client: Client,
    model: String,
    base_url: String,
    api_key: Option<SecretString>,
}

impl GeminiClient {
    /// Create a client reading its credential from the given key store.
    pub fn new(keys: &KeyStore) -> Self {
        Self {
            client: Client::new(),
            model: MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            api_key: keys.api_key().cloned(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different base URL (local test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn streaming_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl LlmClient for GeminiClient {
    fn stream(&self, request: &GenerationRequest, tx: Sender<StreamEvent>) -> Result<(), LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Auth("GEMINI_API_KEY not set".to_string()))?;

        let api_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: request.prompt.clone() }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
            },
        };

        dump_request(&api_request);

        let response = self
            .client
            .post(self.streaming_url())
            .header("x-goog-api-key", api_key.expose_secret())
            .header("Accept", "text/event-stream")
            .json(&api_request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let reader = BufReader::new(response);
        let mut full = String::new();

        for line in reader.lines() {
            let line = line.map_err(|e| LlmError::StreamRead(e.to_string()))?;

            let Some(resp) = parse_sse_line(&line) else {
                continue;
            };

            for text in part_texts(resp) {
                full.push_str(&text);
                if tx.send(StreamEvent::Fragment(text)).is_err() {
                    // Receiver gone (end marker found or cancelled) —
                    // release the session instead of draining it.
                    return Ok(());
                }
            }
        }

        let final_text = if full.is_empty() { None } else { Some(full) };
        let _ = tx.send(StreamEvent::Done { final_text });
        Ok(())
    }
}

/// Parse one SSE line into a stream response; unparsable lines are skipped.
fn parse_sse_line(line: &str) -> Option<StreamResponse> {
    if !line.starts_with("data: ") {
        return None;
    }
    let json_str = &line[6..];
    if json_str == "[DONE]" {
        return None;
    }
    serde_json::from_str(json_str).ok()
}

/// Pull the non-empty text parts out of the first candidate.
fn part_texts(resp: StreamResponse) -> Vec<String> {
    let Some(candidate) = resp.candidates.and_then(|c| c.into_iter().next()) else {
        return Vec::new();
    };
    let Some(parts) = candidate.content.and_then(|c| c.parts) else {
        return Vec::new();
    };
    parts
        .into_iter()
        .filter_map(|p| p.text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Dump the last outbound request for debugging.
fn dump_request(request: &GeminiRequest) {
    let _ = std::fs::create_dir_all(STATE_DIR);
    let path = format!("{}/last_request.json", STATE_DIR);
    let _ = std::fs::write(path, serde_json::to_string_pretty(request).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn streaming_url_includes_model_and_sse() {
        let client = GeminiClient::new(&KeyStore::empty()).with_model("gemini-2.5-flash");
        let url = client.streaming_url();
        assert!(url.contains("models/gemini-2.5-flash:streamGenerateContent"));
        assert!(url.contains("alt=sse"));
    }

    #[test]
    fn missing_key_fails_before_any_network_call() {
        let client = GeminiClient::new(&KeyStore::empty());
        let (tx, rx) = mpsc::channel();
        let request = GenerationRequest { prompt: "hello".to_string() };

        let err = client.stream(&request, tx).unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
        // No events of any kind were produced.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn parse_sse_line_extracts_candidate_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#;
        let resp = parse_sse_line(line).expect("should parse");
        assert_eq!(part_texts(resp), vec!["Hello".to_string()]);
    }

    #[test]
    fn parse_sse_line_skips_non_data_and_done() {
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line("data: [DONE]").is_none());
    }

    #[test]
    fn part_texts_tolerates_empty_candidates() {
        let resp = parse_sse_line(r#"data: {"candidates":[]}"#).expect("should parse");
        assert!(part_texts(resp).is_empty());

        let resp = parse_sse_line(r#"data: {"candidates":[{"content":null}]}"#).expect("should parse");
        assert!(part_texts(resp).is_empty());
    }
}
