//! LLM classifier plugin (§4.8): the last, most expensive plugin. Asks a
//! remote chat-completion endpoint whether a message is inappropriate,
//! behind a content-addressed cache (§4.9).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};
use crate::stores::llm_cache::LlmCache;

pub const PRIORITY: i32 = 250;

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_TEMPERATURE: f64 = 0.1;
const DEFAULT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// The structured verdict a compliant provider returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Classification {
    pub inappropriate: bool,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct LlmPlugin {
    api_key: String,
    model: String,
    prompt: String,
    confidence_threshold: f64,
    timeout: Duration,
    temperature: f64,
    client: HttpClient,
    cache: LlmCache<Classification>,
}

impl LlmPlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        let api_key = config
            .get_str("api_key")
            .ok_or_else(|| Error::InvalidConfig("llm plugin requires api_key".into()))?
            .to_string();
        let model = config
            .get_str("model")
            .ok_or_else(|| Error::InvalidConfig("llm plugin requires model".into()))?
            .to_string();
        let prompt = config
            .get_str("prompt")
            .ok_or_else(|| Error::InvalidConfig("llm plugin requires prompt".into()))?
            .to_string();

        let confidence_threshold = config
            .get_f64("confidence_threshold")
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(Error::InvalidConfig("confidence_threshold must be in [0,1]".into()));
        }

        let timeout = match config.get_str("timeout") {
            Some(s) => crate::duration::parse_duration(s)?,
            None => DEFAULT_TIMEOUT,
        };
        if timeout < MIN_TIMEOUT || timeout > MAX_TIMEOUT {
            return Err(Error::InvalidConfig(format!(
                "timeout must be between {MIN_TIMEOUT:?} and {MAX_TIMEOUT:?}"
            )));
        }

        let temperature = config.get_f64("temperature").unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::InvalidConfig("temperature must be in [0,2]".into()));
        }

        let cache_capacity = config
            .get_i64("cache_capacity")
            .map(|v| v.max(0) as usize)
            .unwrap_or(DEFAULT_CACHE_CAPACITY);
        let cache_ttl = match config.get_str("cache_ttl") {
            Some(s) => crate::duration::parse_duration(s)?,
            None => DEFAULT_CACHE_TTL,
        };

        let base_url = config.get_str("base_url").unwrap_or(DEFAULT_BASE_URL).to_string();
        let client = HttpClient::new(timeout, base_url)?;

        Ok(Self {
            api_key,
            model,
            prompt,
            confidence_threshold,
            timeout,
            temperature,
            client,
            cache: LlmCache::new(cache_capacity, cache_ttl),
        })
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        let prompt = format!("{}\n\nMessage to analyze:\n{:?}", self.prompt, text);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response: ChatCompletionResponse = self
            .client
            .post_json_bearer("/chat/completions", &self.api_key, &request)
            .await?;

        if response.choices.len() != 1 {
            return Err(Error::UnexpectedResponseCount(response.choices.len()));
        }

        let classification: Classification =
            serde_json::from_str(&response.choices[0].message.content).map_err(|e| {
                Error::PluginError {
                    plugin: "llm".into(),
                    message: format!("malformed classification json: {e}"),
                }
            })?;

        if !(0.0..=1.0).contains(&classification.confidence) {
            return Err(Error::InvalidConfidence(classification.confidence));
        }

        Ok(classification)
    }
}

#[async_trait]
impl Plugin for LlmPlugin {
    fn name(&self) -> &str {
        "llm"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let payload = msg.text_or_caption();
        if payload.is_empty() {
            return Ok(Decision::skip(self.name()));
        }

        let key = self.cache_key(payload);
        let classification = if let Some(cached) = self.cache.get(&key) {
            cached
        } else {
            let narrowed_timeout = ctx.remaining().min(self.timeout);
            let classification = tokio::time::timeout(narrowed_timeout, self.classify(payload))
                .await
                .map_err(|_| Error::Timeout)??;
            self.cache.set(key, classification.clone());
            classification
        };

        if classification.inappropriate && classification.confidence >= self.confidence_threshold {
            Ok(Decision::block(self.name(), classification.reason.clone())
                .with_metadata("confidence", json!(classification.confidence)))
        } else {
            Ok(Decision::skip(self.name()).with_metadata("confidence", json!(classification.confidence)))
        }
    }

    async fn cleanup(&self) {
        self.cache.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_depends_only_on_stated_inputs() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("api_key".into(), json!("key"));
        config.opts.insert("model".into(), json!("gpt-4"));
        config.opts.insert("prompt".into(), json!("moderate this"));
        let plugin = LlmPlugin::new(&config).unwrap();

        assert_eq!(plugin.cache_key("hello"), plugin.cache_key("hello"));
        assert_ne!(plugin.cache_key("hello"), plugin.cache_key("world"));
    }

    #[test]
    fn requires_model_and_prompt() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("api_key".into(), json!("key"));
        assert!(LlmPlugin::new(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_confidence_threshold() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("api_key".into(), json!("key"));
        config.opts.insert("model".into(), json!("gpt-4"));
        config.opts.insert("prompt".into(), json!("moderate"));
        config.opts.insert("confidence_threshold".into(), json!(1.5));
        assert!(LlmPlugin::new(&config).is_err());
    }

    fn plugin_against(base_url: &str) -> LlmPlugin {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("api_key".into(), json!("key"));
        config.opts.insert("model".into(), json!("gpt-4"));
        config.opts.insert("prompt".into(), json!("moderate this"));
        config.opts.insert("base_url".into(), json!(base_url));
        LlmPlugin::new(&config).unwrap()
    }

    fn completion_body(inappropriate: bool, confidence: f64, reason: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": {
                    "content": json!({
                        "inappropriate": inappropriate,
                        "confidence": confidence,
                        "reason": reason,
                    }).to_string()
                }
            }]
        })
    }

    #[tokio::test]
    async fn blocks_when_remote_says_inappropriate() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(true, 0.95, "hate speech")))
            .expect(1)
            .mount(&server)
            .await;

        let plugin = plugin_against(&server.uri());
        let ctx = EvalContext::with_timeout(Duration::from_secs(5));
        let msg = Message {
            text: "some offending text".into(),
            ..Default::default()
        };

        let decision = plugin.evaluate(&ctx, &msg).await.unwrap();
        assert_eq!(decision.action, crate::message::Action::Block);
        assert_eq!(decision.reason, "hate speech");

        let decision2 = plugin.evaluate(&ctx, &msg).await.unwrap();
        assert_eq!(decision2.action, crate::message::Action::Block);
    }

    #[tokio::test]
    async fn skips_when_confidence_below_threshold() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(true, 0.1, "borderline")))
            .mount(&server)
            .await;

        let plugin = plugin_against(&server.uri());
        let ctx = EvalContext::with_timeout(Duration::from_secs(5));
        let msg = Message {
            text: "borderline text".into(),
            ..Default::default()
        };

        let decision = plugin.evaluate(&ctx, &msg).await.unwrap();
        assert_eq!(decision.action, crate::message::Action::Skip);
    }

    #[tokio::test]
    async fn rejects_multi_choice_response() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "content": completion_body(false, 0.1, "").to_string() } },
                    { "message": { "content": completion_body(false, 0.1, "").to_string() } },
                ]
            })))
            .mount(&server)
            .await;

        let plugin = plugin_against(&server.uri());
        let ctx = EvalContext::with_timeout(Duration::from_secs(5));
        let msg = Message {
            text: "text".into(),
            ..Default::default()
        };

        let err = plugin.evaluate(&ctx, &msg).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponseCount(2)));
    }
}
