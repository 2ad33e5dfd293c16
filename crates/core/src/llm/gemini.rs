//! Google Gemini generateContent client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Finish reasons that mean the output was withheld by a safety filter.
const BLOCKING_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Gemini API client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            timeout: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let gemini_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            system_instruction: request.system.map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!("Gemini generateContent: model={}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();

        if status != 200 {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&error_text)
                .map(|e| match e.error.status {
                    Some(code) => format!("{}: {}", code, e.error.message),
                    None => e.error.message,
                })
                .unwrap_or(error_text);
            return Err(LlmError::Api { status, message });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_response(&body, &self.model)
    }
}

impl GeminiClient {
    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        match (error.is_timeout(), self.timeout) {
            (true, Some(timeout)) => LlmError::Timeout(timeout),
            _ => LlmError::Http(error.to_string()),
        }
    }
}

/// Extract the completion text from a successful response body.
fn parse_response(body: &str, requested_model: &str) -> Result<CompletionResponse, LlmError> {
    let gemini_response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Json(e.to_string()))?;

    if let Some(reason) = gemini_response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.clone())
    {
        return Err(LlmError::Blocked(format!("prompt blocked: {}", reason)));
    }

    let candidate = gemini_response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyCompletion)?;

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|reason| BLOCKING_FINISH_REASONS.contains(reason))
    {
        return Err(LlmError::Blocked(format!("output withheld: {}", reason)));
    }

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyCompletion);
    }

    let usage = gemini_response
        .usage_metadata
        .map(|usage| LlmUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        text,
        usage,
        model: gemini_response
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_client_creation() {
        let client = GeminiClient::new("key", "gemini-1.5-flash");
        assert_eq!(client.provider(), "gemini");
        assert_eq!(client.model(), "gemini-1.5-flash");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_gemini_client_custom_base() {
        let client = GeminiClient::new("key", "m").with_api_base("http://127.0.0.1:8089/");
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:8089/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: "Hello".to_string(),
                }],
            }],
            system_instruction: None,
            generation_config: GeminiGenerationConfig {
                temperature: 0.5,
                max_output_tokens: 100,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"maxOutputTokens\":100"));
        assert!(json.contains("\"generationConfig\""));
        assert!(!json.contains("systemInstruction"));
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "## CRITICAL"}, {"text": " ISSUES"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30},
            "modelVersion": "gemini-1.5-flash-002"
        })
        .to_string();

        let response = parse_response(&body, "gemini-1.5-flash").unwrap();
        assert_eq!(response.text, "## CRITICAL ISSUES");
        assert_eq!(response.usage.input_tokens, 120);
        assert_eq!(response.usage.output_tokens, 30);
        assert_eq!(response.model, "gemini-1.5-flash-002");
    }

    #[test]
    fn test_parse_response_prompt_blocked() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        let err = parse_response(&body, "m").unwrap_err();
        assert!(matches!(err, LlmError::Blocked(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_parse_response_output_withheld() {
        let body = json!({"candidates": [{"finishReason": "PROHIBITED_CONTENT"}]}).to_string();
        let err = parse_response(&body, "m").unwrap_err();
        assert!(matches!(err, LlmError::Blocked(_)));
    }

    #[test]
    fn test_parse_response_empty_text() {
        let no_candidates = json!({"candidates": []}).to_string();
        assert!(matches!(
            parse_response(&no_candidates, "m"),
            Err(LlmError::EmptyCompletion)
        ));

        let blank = json!({
            "candidates": [{"content": {"parts": [{"text": "  \n"}]}, "finishReason": "STOP"}]
        })
        .to_string();
        assert!(matches!(
            parse_response(&blank, "m"),
            Err(LlmError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(
            parse_response("<html>", "m"),
            Err(LlmError::Json(_))
        ));
    }
}
