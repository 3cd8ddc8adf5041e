use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigError, LlmConfig};
use crate::prompt::CompiledPrompt;

/// Raw text of the first choice, passed to the caller unmodified.
pub type LlmResponse = String;

const MAX_LOGGED_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed upstream response: {0}")]
    Malformed(String),
    #[error("Upstream response contained no choices")]
    EmptyChoices,
}

/// Sends a compiled prompt to a generative model and returns its reply.
pub trait ReportGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a CompiledPrompt) -> BoxFuture<'a, Result<LlmResponse, UpstreamError>>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client. The inner `reqwest::Client` is
/// shared, so clones reuse one connection pool.
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model_id: String,
}

impl ChatCompletionClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig) -> Result<Self, ConfigError> {
        let raw = format!("{}/chat/completions", config.base_url.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&raw).map_err(|_| ConfigError::InvalidVar {
            name: "LLM_BASE_URL",
            value: config.base_url.to_string(),
        })?;
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn complete(&self, prompt: &CompiledPrompt) -> Result<LlmResponse, UpstreamError> {
        let request = ChatCompletionRequest {
            model: &self.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.as_str(),
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_LOGGED_BODY {
                let mut cut = MAX_LOGGED_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        let choice = parsed.choices.into_iter().next().ok_or(UpstreamError::EmptyChoices)?;
        choice
            .message
            .content
            .ok_or_else(|| UpstreamError::Malformed("first choice has no content".into()))
    }
}

impl ReportGenerator for ChatCompletionClient {
    fn generate<'a>(&'a self, prompt: &'a CompiledPrompt) -> BoxFuture<'a, Result<LlmResponse, UpstreamError>> {
        Box::pin(self.complete(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{compile_triage, Language};
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatCompletionClient {
        let config = LlmConfig {
            api_key: "test-key".into(),
            base_url: Url::parse(&format!("{}/openai/v1", server.uri())).unwrap(),
            model_id: "llama3-8b-8192".into(),
        };
        ChatCompletionClient::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let config = LlmConfig {
            api_key: "k".into(),
            base_url: Url::parse("https://api.groq.com/openai/v1/").unwrap(),
            model_id: "m".into(),
        };
        let client = ChatCompletionClient::new(reqwest::Client::new(), &config).unwrap();
        assert_eq!(client.endpoint().as_str(), "https://api.groq.com/openai/v1/chat/completions");
    }

    #[actix_web::test]
    async fn returns_first_choice_verbatim() {
        let server = MockServer::start().await;
        let prompt = compile_triage(Language::English, "none", "sore throat");
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(bearer_token("test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3-8b-8192",
                "messages": [{"role": "user", "content": prompt.as_str()}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "  Drink warm fluids.\n"}},
                    {"message": {"role": "assistant", "content": "second"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).generate(&prompt).await.unwrap();
        assert_eq!(reply, "  Drink warm fluids.\n");
    }

    #[actix_web::test]
    async fn error_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let prompt = compile_triage(Language::English, "none", "cough");
        let err = client_for(&server).generate(&prompt).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 429, .. }));
    }

    #[actix_web::test]
    async fn empty_choices_and_bad_json_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let prompt = compile_triage(Language::Hindi, "none", "fever");
        assert!(matches!(client.generate(&prompt).await, Err(UpstreamError::EmptyChoices)));
        assert!(matches!(client.generate(&prompt).await, Err(UpstreamError::Malformed(_))));
    }
}
