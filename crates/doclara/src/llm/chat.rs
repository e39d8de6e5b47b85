//! OpenAI-compatible `/chat/completions` client (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ModelClient, ModelError};
use crate::config::ModelConfig;

/// Maximum length for error bodies kept in [`ModelError::Status`].
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn sanitize_error_body(body: &str) -> String {
    let truncated = crate::sanitize::truncate_chars(body, MAX_ERROR_BODY_LENGTH);
    if truncated.len() < body.len() {
        format!("{}... (truncated)", truncated)
    } else {
        body.to_string()
    }
}

pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    timeout_secs: u64,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: SecretString,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ModelError::ClientInit(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout_secs: request_timeout.as_secs(),
        })
    }

    /// Client for the classification model described by `config`.
    pub fn for_classification(
        config: &ModelConfig,
        api_key: SecretString,
    ) -> Result<Self, ModelError> {
        Self::new(
            &config.base_url,
            &config.classify_model,
            api_key,
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// Client for the analysis model described by `config`.
    pub fn for_analysis(config: &ModelConfig, api_key: SecretString) -> Result<Self, ModelError> {
        Self::new(
            &config.base_url,
            &config.analyze_model,
            api_key,
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_connect() {
            ModelError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ModelError::Timeout(self.timeout_secs)
        } else {
            ModelError::Http(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(
    model: &'a str,
    system_instruction: &'a str,
    user_message: &'a str,
    temperature: f32,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: system_instruction,
            },
            ChatMessage {
                role: "user",
                content: user_message,
            },
        ],
        temperature,
        stream: false,
    }
}

fn extract_content(body: &str) -> Result<String, ModelError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelError::ResponseParse(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(ModelError::EmptyResponse)?;

    Ok(content.trim().to_string())
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let body = build_request(&self.model, system_instruction, user_message, temperature);

        log::debug!(
            "Calling model {} (temperature {}, {} input chars)",
            self.model,
            temperature,
            user_message.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&text),
            });
        }

        extract_content(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            base_url,
            "llama-3.1-8b-instant",
            SecretString::from("gsk_test".to_string()),
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let c = client("https://api.groq.com/openai/v1/");
        assert_eq!(c.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(c.model(), "llama-3.1-8b-instant");
    }

    #[test]
    fn test_request_body_shape() {
        let request = build_request("m", "sys", "user text", 0.3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "user text");
        assert!((json["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_extract_content_trims() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  TIPO: Multa\n"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "TIPO: Multa");
    }

    #[test]
    fn test_extract_content_no_choices() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(ModelError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ModelError::EmptyResponse)
        ));
    }

    #[test]
    fn test_extract_content_malformed() {
        assert!(matches!(
            extract_content("<html>502</html>"),
            Err(ModelError::ResponseParse(_))
        ));
    }

    #[test]
    fn test_sanitize_error_body_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_error_body(&long);
        assert!(sanitized.ends_with("... (truncated)"));
        assert!(sanitized.len() < 250);
        assert_eq!(sanitize_error_body("rate limited"), "rate limited");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_model_error() {
        let c = client("http://127.0.0.1:9");
        let result = c.complete("sys", "user", 0.3).await;
        assert!(result.is_err());
    }
}
