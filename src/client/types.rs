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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::error::{ClientError, Result};
use crate::context::ChatMessage;

/// Incremental piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub delta_content: String,
    pub accumulated_content: String,
    pub done: bool,
}

/// Final outcome of one completion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub model: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Receives progress of a completion call
pub trait StreamSink: Send {
    fn on_chunk(&mut self, _chunk: &StreamChunk) {}
    fn on_complete(&mut self, _result: &CompletionResult) {}
    fn on_error(&mut self, _error: &ClientError) {}
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StreamSink for NoopSink {}

/// Completion backend used by the dialogue router
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `messages` and stream the reply into `sink`.
    /// The final error, if any, is reported to `sink.on_error` before returning.
    async fn send_message(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn StreamSink,
    ) -> Result<CompletionResult> {
        self.send_message_with_cancel(messages, sink, CancellationToken::new())
            .await
    }

    /// [`CompletionClient::send_message`] that also stops when `cancel` fires.
    /// A token cancelled before the call means no request is sent.
    async fn send_message_with_cancel(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn StreamSink,
        cancel: CancellationToken,
    ) -> Result<CompletionResult>;

    /// Abort the in-flight request, if any
    fn cancel(&self);

    fn model_info(&self) -> ModelInfo;
}
