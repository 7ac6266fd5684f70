use super::{ChatClient, ChatCompletion, ChatRequest, LlmError};
use crate::config::OpenAiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: i64,
}

impl OpenAiClient {
    /// Build a client from config. Returns `None` when no API key is configured.
    pub fn from_config(config: &OpenAiConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_ref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Some(Self {
            client,
            base_url: ensure_slash(&config.base_url),
            api_key: api_key.clone(),
        }))
    }
}

/// `Url::join` drops the last path segment unless the base ends with a slash.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        new_url.set_path(&format!("{}/", url.path()));
        new_url
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        let url = self.base_url.join("chat/completions")?;
        debug!("Requesting chat completion from {}", url);

        let response = self.client.post(url).bearer_auth(&self.api_key).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "Chat completion request failed");
            return Err(LlmError::Api { status, body });
        }

        let body: CompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(ChatCompletion {
            content,
            total_tokens: body.usage.map(|u| u.total_tokens).unwrap_or(0),
            model: body.model.unwrap_or(request.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
            ..Default::default()
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
            temperature: Some(0.0),
            max_tokens: None,
        }
    }

    #[test]
    fn test_no_api_key_means_no_client() {
        let client = OpenAiClient::from_config(&OpenAiConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[tokio::test]
    async fn test_complete_parses_first_choice_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"message": {"role": "assistant", "content": "hello!"}}],
                "usage": {"prompt_tokens": 7, "completion_tokens": 2, "total_tokens": 9}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::from_config(&config_for(&server)).unwrap().unwrap();
        let completion = client.complete(request()).await.unwrap();

        assert_eq!(completion.content, "hello!");
        assert_eq!(completion.total_tokens, 9);
        assert_eq!(completion.model, "gpt-4o-mini-2024-07-18");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::from_config(&config_for(&server)).unwrap().unwrap();
        let err = client.complete(request()).await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 429, ref body } if body == "slow down"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::from_config(&config_for(&server)).unwrap().unwrap();
        let err = client.complete(request()).await.unwrap_err();

        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
