//! HTTP client for the OpenAI-compatible completion server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use ivrl_core::{IvrlError, Result, Split};

use crate::counters;
use crate::settings::InferenceConfig;

/// One batched completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fully rendered prompt
    pub prompt: String,
    /// Completions to sample
    pub n: usize,
    pub max_tokens: usize,
    pub temperature: f64,
    pub split: Split,
}

/// Anything that can sample completions for a prompt
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Completion texts, one per sample
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>>;
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: usize,
    max_tokens: usize,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// Client for `POST {base_url}/completions`
pub struct OpenAiCompletionClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    eval_permits: Arc<Semaphore>,
}

impl OpenAiCompletionClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| IvrlError::Inference(format!("Failed to build HTTP client: {e}")))?;

        let api_key = Some(config.api_key.clone()).filter(|k| !k.is_empty());

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            api_key,
            eval_permits: Arc::new(Semaphore::new(config.num_requests_for_eval.max(1))),
        })
    }

    async fn post(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let url = format!("{}/completions", self.base_url);
        debug!("POST {} (n={}, split={})", url, request.n, request.split);

        let body = CompletionBody {
            model: &self.model,
            prompt: &request.prompt,
            n: request.n,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut builder = self.client.post(&url).json(&body);
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| IvrlError::Inference(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IvrlError::Inference(format!(
                "Request failed ({status}): {body}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| IvrlError::Inference(format!("Failed to parse response: {e}")))?;

        Ok(parsed.choices.into_iter().map(|c| c.text).collect())
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>> {
        counters::INFERENCE_REQUESTS_TOTAL
            .with_label_values(&[request.split.as_str()])
            .inc();

        let result = match request.split {
            Split::Eval => {
                let _permit = self
                    .eval_permits
                    .acquire()
                    .await
                    .map_err(|e| IvrlError::Internal(format!("Eval semaphore closed: {e}")))?;
                self.post(&request).await
            }
            Split::Train => self.post(&request).await,
        };

        if result.is_err() {
            counters::INFERENCE_ERRORS_TOTAL
                .with_label_values(&[request.split.as_str()])
                .inc();
        }
        result
    }
}
