// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streaming client for OpenAI-compatible chat-completion endpoints
//! (OpenRouter by default).

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::Response;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::error::{ClientError, Result};
use crate::client::retry::RetryConfig;
use crate::client::sse::{LineBuffer, StreamAccumulator};
use crate::client::types::{
    CompletionClient, CompletionResult, ModelInfo, StreamChunk, StreamSink,
};
use crate::context::ChatMessage;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SITE_NAME: &str = "Hybridbot";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS_LIMIT: u32 = 32768;

/// Settings for [`StreamingClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Sent as `X-Title`
    pub site_name: String,
    /// Sent as `HTTP-Referer` when set
    pub site_url: Option<String>,
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub streaming: bool,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            site_name: DEFAULT_SITE_NAME.to_string(),
            site_url: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            streaming: true,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_site(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.site_name = name.into();
        self.site_url = url.filter(|u| !u.is_empty());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Configuration("API key is required".to_string()));
        }
        if !self.base_url.starts_with("http") {
            return Err(ClientError::Configuration(format!(
                "Invalid base URL: {}",
                self.base_url
            )));
        }
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(ClientError::Configuration(format!(
                "max_tokens must be between 1 and {}, got {}",
                MAX_TOKENS_LIMIT, self.max_tokens
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ClientError::Configuration(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// Chat-completion client with retry, backoff and cooperative cancellation
pub struct StreamingClient {
    http: reqwest::Client,
    config: ClientConfig,
    active: Mutex<Option<(u64, CancellationToken)>>,
    next_request_id: AtomicU64,
}

/// Clears the active cancellation token when a call exits, however it exits
struct ActiveRequest<'a> {
    slot: &'a Mutex<Option<(u64, CancellationToken)>>,
    id: u64,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *slot = None;
        }
    }
}

impl StreamingClient {
    pub fn new(mut config: ClientConfig) -> Result<Self> {
        config.validate()?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .user_agent(concat!("hybridbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            active: Mutex::new(None),
            next_request_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Register `token` as the one [`CompletionClient::cancel`] fires
    fn begin_request(&self, token: &CancellationToken) -> ActiveRequest<'_> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        *self.active.lock() = Some((id, token.clone()));
        ActiveRequest {
            slot: &self.active,
            id,
        }
    }

    /// Run `fut` unless the request is cancelled or the timeout elapses first
    async fn guarded<F: Future>(&self, fut: F, token: &CancellationToken) -> Result<F::Output> {
        let timeout = self.config.timeout;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(ClientError::Timeout(timeout)),
            out = fut => Ok(out),
        }
    }

    async fn attempt(
        &self,
        body: &CompletionRequest<'_>,
        token: &CancellationToken,
        sink: &mut dyn StreamSink,
    ) -> Result<CompletionResult> {
        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Title", &self.config.site_name)
            .json(body);
        if let Some(site_url) = &self.config.site_url {
            request = request.header("HTTP-Referer", site_url);
        }

        let response = self.guarded(request.send(), token).await??;

        if !response.status().is_success() {
            return Err(self.error_from_response(response, token).await);
        }

        if self.config.streaming {
            self.read_stream(response, token, sink).await
        } else {
            self.read_whole(response, token, sink).await
        }
    }

    async fn read_stream(
        &self,
        response: Response,
        token: &CancellationToken,
        sink: &mut dyn StreamSink,
    ) -> Result<CompletionResult> {
        let mut body = std::pin::pin!(response.bytes_stream());
        let mut lines = LineBuffer::new();
        let mut acc = StreamAccumulator::new();

        loop {
            let next = self
                .guarded(body.next(), token)
                .await
                .map_err(|e| e.after_delivery(acc.content()))?;
            let Some(next) = next else { break };
            let bytes = next.map_err(|e| ClientError::from(e).after_delivery(acc.content()))?;
            for line in lines.push(&bytes) {
                if let Some(chunk) = acc.apply_line(&line) {
                    sink.on_chunk(&chunk);
                }
            }
        }

        if let Some(tail) = lines.finish() {
            if let Some(chunk) = acc.apply_line(&tail) {
                sink.on_chunk(&chunk);
            }
        }

        debug!(
            chars = acc.content().len(),
            finish_reason = acc.finish_reason().unwrap_or("none"),
            "Stream completed"
        );

        Ok(CompletionResult {
            content: acc.into_content(),
            model: self.config.model.clone(),
            done: true,
        })
    }

    async fn read_whole(
        &self,
        response: Response,
        token: &CancellationToken,
        sink: &mut dyn StreamSink,
    ) -> Result<CompletionResult> {
        let data: Value = self
            .guarded(response.json::<Value>(), token)
            .await?
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Parse("No content in completion response".to_string()))?
            .to_string();

        if !content.is_empty() {
            sink.on_chunk(&StreamChunk {
                delta_content: content.clone(),
                accumulated_content: content.clone(),
                done: false,
            });
        }

        Ok(CompletionResult {
            content,
            model: self.config.model.clone(),
            done: true,
        })
    }

    async fn error_from_response(&self, response: Response, token: &CancellationToken) -> ClientError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let provider_message = match self.guarded(response.json::<Value>(), token).await {
            Ok(Ok(body)) => body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string),
            Ok(Err(_)) => None,
            Err(e @ ClientError::Cancelled) => return e,
            Err(_) => None,
        };

        ClientError::from_status(status, provider_message, retry_after)
    }
}

#[async_trait]
impl CompletionClient for StreamingClient {
    async fn send_message_with_cancel(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn StreamSink,
        token: CancellationToken,
    ) -> Result<CompletionResult> {
        let _active = self.begin_request(&token);
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: self.config.streaming,
        };
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            info!(
                model = %self.config.model,
                attempt = attempt + 1,
                max_attempts = retry.max_attempts(),
                messages = messages.len(),
                "Sending completion request"
            );

            let error = match self.attempt(&body, &token, sink).await {
                Ok(result) => {
                    sink.on_complete(&result);
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!(error = %error, kind = ?error.kind(), "Completion request failed, not retrying");
                sink.on_error(&error);
                return Err(error);
            }

            attempt += 1;
            if attempt > retry.retry_attempts {
                warn!(error = %error, attempts = attempt, "Completion request failed after retries");
                sink.on_error(&error);
                return Err(error);
            }

            let delay = retry.delay_for(attempt);
            warn!(
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying completion request"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    let error = ClientError::Cancelled;
                    sink.on_error(&error);
                    return Err(error);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancel(&self) {
        if let Some((id, token)) = self.active.lock().as_ref() {
            token.cancel();
            info!(request_id = id, "Completion request cancelled");
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}
