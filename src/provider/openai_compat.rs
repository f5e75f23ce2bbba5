// src/provider/openai_compat.rs — Generic OpenAI-compatible provider
//
// Talks to any `/chat/completions` endpoint (OpenAI, Groq, OpenRouter, a
// local llama.cpp server, ...). Images ride as `image_url` content parts.

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, Message, ModelInfo, ModelProvider, TokenUsage};
use crate::core::request::supports_vision;
use crate::infra::config::ProviderConfig;
use crate::infra::errors::LoopError;

/// Provider for any OpenAI-compatible API endpoint.
pub struct OpenAICompatProvider {
    id_str: String,
    name_str: String,
    api_key: String,
    base_url: String,
    default_model: String,
    vision_prefixes: Vec<String>,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_key: String,
        base_url: String,
        default_model: String,
    ) -> Self {
        Self {
            id_str: id.into(),
            name_str: name.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
            vision_prefixes: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from the `[provider]` config section, reading the key from the
    /// configured environment variable.
    pub fn from_config(cfg: &ProviderConfig, default_model: &str) -> Result<Self, LoopError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LoopError::MissingApiKey {
                provider: cfg.id.clone(),
                env_var: cfg.api_key_env.clone(),
            })?;
        Ok(Self::new(
            cfg.id.clone(),
            cfg.id.clone(),
            api_key,
            cfg.base_url.clone(),
            default_model.to_string(),
        ))
    }

    pub fn with_vision_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.vision_prefixes = prefixes;
        self
    }
}

/// Encode messages into the chat-completions wire shape. Messages with
/// images use the content-parts array; plain messages keep a string body.
pub(crate) fn encode_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            if m.images.is_empty() {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            } else {
                let mut parts = vec![serde_json::json!({"type": "text", "text": m.content})];
                parts.extend(m.images.iter().map(|img| {
                    serde_json::json!({
                        "type": "image_url",
                        "image_url": {"url": img.url},
                    })
                }));
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": parts,
                })
            }
        })
        .collect()
}

/// Pull `choices[0].message.content` out of a response body. Anything else
/// is a malformed reply, not a transport failure.
pub(crate) fn extract_response(
    provider: &str,
    resp: &serde_json::Value,
) -> Result<ChatResponse, LoopError> {
    let choice = resp["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| LoopError::MalformedResponse {
            provider: provider.to_string(),
            message: "response has no choices".into(),
        })?;

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| LoopError::MalformedResponse {
            provider: provider.to_string(),
            message: "first choice has no message content".into(),
        })?
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ChatResponse { content, usage })
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    fn name(&self) -> &str {
        &self.name_str
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: self.default_model.clone(),
            name: self.default_model.clone(),
            supports_vision: supports_vision(&self.default_model, &self.vision_prefixes),
        }]
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LoopError> {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": encode_messages(&request.messages),
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header(
                "User-Agent",
                format!("shaderloop/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| LoopError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LoopError::Provider {
                provider: self.id_str.clone(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error()
                    || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let resp: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| LoopError::MalformedResponse {
                    provider: self.id_str.clone(),
                    message: format!("Failed to parse response: {}", e),
                })?;

        let parsed = extract_response(&self.id_str, &resp)?;
        tracing::debug!(
            provider = %self.id_str,
            model = %request.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "chat completion received"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImagePart;

    // ─── encode_messages ────────────────────────────────────────

    #[test]
    fn test_encode_plain_message_as_string() {
        let encoded = encode_messages(&[Message::system("sys"), Message::user("hi")]);
        assert_eq!(encoded[0]["role"], "system");
        assert_eq!(encoded[1]["content"], "hi");
    }

    #[test]
    fn test_encode_message_with_image_parts() {
        let msg = Message::user("look").with_images(vec![ImagePart {
            url: "data:image/png;base64,AAAA".into(),
        }]);
        let encoded = encode_messages(&[msg]);
        let parts = encoded[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "look");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    // ─── extract_response ───────────────────────────────────────

    #[test]
    fn test_extract_content_and_usage() {
        let resp = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "void main() {}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5},
        });
        let parsed = extract_response("openai", &resp).unwrap();
        assert_eq!(parsed.content, "void main() {}");
        assert_eq!(parsed.usage.total(), 17);
    }

    #[test]
    fn test_extract_missing_choices_is_malformed() {
        let resp = serde_json::json!({"error": "overloaded"});
        let err = extract_response("openai", &resp).unwrap_err();
        assert!(err.is_malformed_response());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_extract_empty_choices_is_malformed() {
        let resp = serde_json::json!({"choices": []});
        assert!(extract_response("openai", &resp)
            .unwrap_err()
            .is_malformed_response());
    }

    #[test]
    fn test_extract_null_content_is_malformed() {
        let resp = serde_json::json!({"choices": [{"message": {"content": null}}]});
        assert!(extract_response("openai", &resp)
            .unwrap_err()
            .is_malformed_response());
    }

    // ─── construction ───────────────────────────────────────────

    #[test]
    fn test_from_config_missing_key() {
        let cfg = ProviderConfig {
            api_key_env: "SHADERLOOP_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let err = OpenAICompatProvider::from_config(&cfg, "gpt-4o")
            .err()
            .unwrap();
        assert!(matches!(err, LoopError::MissingApiKey { .. }));
    }

    #[test]
    fn test_models_reports_vision_support() {
        let p = OpenAICompatProvider::new(
            "openai",
            "OpenAI",
            "sk-test".into(),
            "https://api.openai.com/v1/".into(),
            "gpt-4o-mini".into(),
        )
        .with_vision_prefixes(vec!["gpt-4o".into()]);
        let models = p.models();
        assert_eq!(models.len(), 1);
        assert!(models[0].supports_vision);
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }
}
