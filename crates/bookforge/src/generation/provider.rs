//! LLM provider clients and their configuration.
//!
//! Each configured provider becomes one HTTP client. Dispatch goes
//! through the [`Provider`] enum so the rotation layer can hold a
//! homogeneous list without boxing.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{GenerationError, TextGenerator};

const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GENERATION_TEMPERATURE: f32 = 0.7;

fn default_gemini_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_openai_endpoint() -> String {
    DEFAULT_OPENAI_ENDPOINT.to_string()
}

/// Configuration for a single generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Gemini {
        api_key: String,
        model: String,
        #[serde(default = "default_gemini_endpoint")]
        endpoint: String,
    },
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        model: String,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
}

impl ProviderConfig {
    /// Returns the provider type name as used in config files.
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::OpenAi { .. } => "openai",
        }
    }

    /// Returns the configured model identifier.
    pub fn model_id(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } => model,
            ProviderConfig::OpenAi { model, .. } => model,
        }
    }
}

/// A ready-to-use generation provider.
pub enum Provider {
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
}

impl Provider {
    /// Builds a provider client from its configuration.
    pub fn from_config(config: &ProviderConfig, timeout_secs: u64) -> Result<Self, GenerationError> {
        match config {
            ProviderConfig::Gemini {
                api_key,
                model,
                endpoint,
            } => Ok(Provider::Gemini(GeminiClient::new(
                api_key,
                model,
                endpoint,
                timeout_secs,
            )?)),
            ProviderConfig::OpenAi {
                api_key,
                model,
                endpoint,
            } => Ok(Provider::OpenAi(OpenAiClient::new(
                api_key,
                model,
                endpoint,
                timeout_secs,
            )?)),
        }
    }

    /// Short label for logs and error messages, e.g. `gemini:gemini-1.5-flash`.
    pub fn label(&self) -> String {
        match self {
            Provider::Gemini(client) => format!("gemini:{}", client.model),
            Provider::OpenAi(client) => format!("openai:{}", client.model),
        }
    }
}

#[async_trait]
impl TextGenerator for Provider {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match self {
            Provider::Gemini(client) => client.generate(prompt).await,
            Provider::OpenAi(client) => client.generate(prompt).await,
        }
    }
}

fn build_client(label: &str, timeout_secs: u64) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GenerationError::Http {
            provider: label.to_string(),
            message: e.to_string(),
        })
}

/// Classifies a non-success HTTP status into a generation error.
fn classify_status(label: &str, status: reqwest::StatusCode, body: String) -> GenerationError {
    match status.as_u16() {
        429 => GenerationError::RateLimited {
            provider: label.to_string(),
            message: body,
        },
        503 => GenerationError::Overloaded {
            provider: label.to_string(),
            message: body,
        },
        _ => GenerationError::Http {
            provider: label.to_string(),
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
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
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

/// Client for Google's Gemini API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        endpoint: &str,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: build_client(&format!("gemini:{model}"), timeout_secs)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn label(&self) -> String {
        format!("gemini:{}", self.model)
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let label = self.label();
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: GENERATION_TEMPERATURE,
            },
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(self.build_url())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Http {
                provider: label.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_status(&label, status, text));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::InvalidResponse {
                provider: label.clone(),
                message: e.to_string(),
            })?;

        // Gemini sometimes reports quota errors in a 200 body.
        if let Some(error) = parsed.error {
            if error.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
                return Err(GenerationError::RateLimited {
                    provider: label,
                    message: error.message,
                });
            }
            return Err(GenerationError::InvalidResponse {
                provider: label,
                message: error.message,
            });
        }

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GenerationError::InvalidResponse {
                provider: label,
                message: "No content in response".to_string(),
            })
    }
}

// OpenAI-compatible chat completion structures

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        endpoint: &str,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: build_client(&format!("openai:{model}"), timeout_secs)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
        })
    }

    fn label(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let label = self.label();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| GenerationError::Http {
                provider: label.clone(),
                message: e.to_string(),
            })?,
        );

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: GENERATION_TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Http {
                provider: label.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_status(&label, status, text));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::InvalidResponse {
                provider: label.clone(),
                message: e.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse {
                provider: label,
                message: "Missing choices".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_yaml() {
        let yaml = r#"
type: gemini
api_key: test-key
model: gemini-1.5-flash
"#;
        let config: ProviderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider_type(), "gemini");
        assert_eq!(config.model_id(), "gemini-1.5-flash");
        match config {
            ProviderConfig::Gemini { endpoint, .. } => {
                assert!(endpoint.contains("generativelanguage.googleapis.com"));
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_openai_config_custom_endpoint() {
        let yaml = r#"
type: openai
api_key: sk-test
model: gpt-4o-mini
endpoint: http://localhost:8080/v1/chat/completions
"#;
        let config: ProviderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider_type(), "openai");
        match config {
            ProviderConfig::OpenAi { endpoint, .. } => {
                assert_eq!(endpoint, "http://localhost:8080/v1/chat/completions");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_gemini_build_url() {
        let client = GeminiClient::new(
            "test-key",
            "gemini-1.5-pro",
            DEFAULT_GEMINI_ENDPOINT,
            30,
        )
        .unwrap();
        let url = client.build_url();
        assert!(url.contains("gemini-1.5-pro:generateContent"));
        assert!(url.contains("key=test-key"));
    }

    #[test]
    fn test_status_classification() {
        let err = classify_status(
            "gemini:flash",
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "quota".to_string(),
        );
        assert!(err.is_transient());

        let err = classify_status(
            "gemini:flash",
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "busy".to_string(),
        );
        assert!(matches!(err, GenerationError::Overloaded { .. }));

        let err = classify_status(
            "gemini:flash",
            reqwest::StatusCode::UNAUTHORIZED,
            "bad key".to_string(),
        );
        assert!(!err.is_transient());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_provider_label() {
        let config = ProviderConfig::Gemini {
            api_key: "k".to_string(),
            model: "gemini-1.5-flash".to_string(),
            endpoint: default_gemini_endpoint(),
        };
        let provider = Provider::from_config(&config, 30).unwrap();
        assert_eq!(provider.label(), "gemini:gemini-1.5-flash");
    }
}
