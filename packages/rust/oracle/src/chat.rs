//! OpenAI-compatible chat-completions oracle.

use std::time::Duration;

use lipidsort_shared::{LipidSortError, OracleConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::Oracle;

/// User-Agent string for oracle requests.
const USER_AGENT: &str = concat!("lipidsort/", env!("CARGO_PKG_VERSION"));

/// How much of an error body to echo back in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// ChatOracle
// ---------------------------------------------------------------------------

/// Everything needed to build a [`ChatOracle`].
#[derive(Debug, Clone)]
pub struct ChatOracleOptions {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: Url,
    /// Bearer token.
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl ChatOracleOptions {
    /// Merge the `[oracle]` config section with a resolved API key.
    pub fn from_config(config: &OracleConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            base_url: config.parsed_base_url()?,
            api_key,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Oracle backed by a chat-completions endpoint.
pub struct ChatOracle {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl ChatOracle {
    pub fn new(options: ChatOracleOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| LipidSortError::oracle(format!("failed to build HTTP client: {e}")))?;

        let endpoint = completions_endpoint(&options.base_url)?;

        Ok(Self {
            client,
            endpoint,
            api_key: options.api_key,
            model: options.model,
            system_prompt: options.system_prompt,
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Oracle for ChatOracle {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn ask(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LipidSortError::oracle(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(LipidSortError::oracle(format!(
                "{}: HTTP {status}: {preview}",
                self.endpoint
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LipidSortError::oracle(format!("undecodable completion: {e}")))?;

        if let Some(usage) = &body.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "oracle usage"
            );
        }

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LipidSortError::oracle("completion contained no choices"))?;

        // A null content is a reply with nothing usable in it, not a transport failure.
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// `{base}/chat/completions`, tolerant of a trailing slash on the base.
fn completions_endpoint(base: &Url) -> Result<Url> {
    let joined = format!("{}/chat/completions", base.as_str().trim_end_matches('/'));
    Url::parse(&joined)
        .map_err(|e| LipidSortError::config(format!("invalid oracle endpoint '{joined}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_for(server: &MockServer) -> ChatOracleOptions {
        ChatOracleOptions {
            base_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
            api_key: "test-key".into(),
            model: "gpt-4o".into(),
            system_prompt: "You are sorting compounds.".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let with = Url::parse("https://api.example.com/v1/").unwrap();
        let without = Url::parse("https://api.example.com/v1").unwrap();
        assert_eq!(
            completions_endpoint(&with).unwrap().as_str(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint(&with).unwrap(),
            completions_endpoint(&without).unwrap()
        );
    }

    #[test]
    fn options_from_config() {
        let config = OracleConfig::default();
        let opts = ChatOracleOptions::from_config(&config, "k".into()).unwrap();
        assert_eq!(opts.model, "gpt-4o");
        assert_eq!(opts.base_url.as_str(), "https://api.openai.com/v1");
    }

    #[test]
    fn request_serializes_system_then_user() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "Oleic Acid",
                },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Oleic Acid");
    }

    #[tokio::test]
    async fn ask_returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "You are sorting compounds."},
                    {"role": "user", "content": "Group these compounds"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "Oleic Acid => Fatty Acids"}}
                ],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(options_for(&server)).unwrap();
        let reply = oracle.ask("Group these compounds").await.unwrap();
        assert_eq!(reply, "Oleic Acid => Fatty Acids");
    }

    #[tokio::test]
    async fn http_error_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(options_for(&server)).unwrap();
        let err = oracle.ask("prompt").await.unwrap_err();
        assert!(matches!(err, LipidSortError::Oracle(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn empty_choices_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(options_for(&server)).unwrap();
        let err = oracle.ask("prompt").await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn null_content_degrades_to_empty_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(options_for(&server)).unwrap();
        assert_eq!(oracle.ask("prompt").await.unwrap(), "");
    }

    #[tokio::test]
    async fn garbage_body_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(options_for(&server)).unwrap();
        let err = oracle.ask("prompt").await.unwrap_err();
        assert!(err.to_string().contains("undecodable"));
    }
}
