//! A minimal HTTP client wrapper for the LLM plugin's remote classification
//! call, grounded on a provider SDK's bearer-authenticated JSON client but
//! trimmed to the single non-streaming call this engine needs — no
//! retries, circuit breaker, or multi-provider dispatch.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;

#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(timeout: Duration, base_url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitFailed(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub async fn post_json_bearer<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &TReq,
    ) -> Result<TResp, Error> {
        let url = if path.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::PluginError {
                plugin: "llm".into(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::PluginError {
                plugin: "llm".into(),
                message: format!("provider returned {status}: {body_text}"),
            });
        }

        response.json::<TResp>().await.map_err(|e| Error::PluginError {
            plugin: "llm".into(),
            message: format!("failed to decode response: {e}"),
        })
    }
}
