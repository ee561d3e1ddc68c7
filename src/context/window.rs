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

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_MESSAGES: usize = 10;
pub const DEFAULT_MAX_TOKENS: usize = 2000;

/// Version tag written into exported snapshots
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Messages kept regardless of the token budget
const MIN_RETAINED_MESSAGES: usize = 2;

/// Speaker of a context message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Stored context entry with bookkeeping metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub token_estimate: usize,
}

/// Wire projection of a message, as sent to the completion provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Approximate token count: one token per four characters, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStats {
    pub message_count: usize,
    pub estimated_tokens: usize,
    pub max_messages: usize,
    pub max_tokens: usize,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Persisted form of a context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    #[serde(default = "default_snapshot_version")]
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub max_messages: usize,
    #[serde(default)]
    pub max_tokens: usize,
    #[serde(alias = "contextWindow")]
    pub messages: Vec<SnapshotMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ContextStats>,
}

fn default_snapshot_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

/// Result of restoring a snapshot; failures are reported, not raised
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success: bool,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sliding window over the most recent conversation turns.
///
/// After every mutation the window holds at most `max_messages` entries and
/// stays within `max_tokens`, except that token trimming never drops below
/// the last two messages.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    messages: VecDeque<Message>,
    max_messages: usize,
    max_tokens: usize,
    system_prompt: String,
    total_tokens: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS)
    }
}

impl ContextWindow {
    pub fn new(system_prompt: impl Into<String>, max_messages: usize, max_tokens: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
            max_tokens: max_tokens.max(1),
            system_prompt: system_prompt.into(),
            total_tokens: 0,
        }
    }

    /// Append a message and trim the window back within its limits.
    /// Empty content is ignored.
    pub fn add_message(&mut self, role: Role, content: &str) {
        if content.is_empty() {
            warn!(%role, "Ignoring context message with empty content");
            return;
        }

        let message = Message {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            token_estimate: estimate_tokens(content),
        };

        self.total_tokens += message.token_estimate;
        debug!(
            %role,
            tokens = message.token_estimate,
            total_messages = self.messages.len() + 1,
            total_tokens = self.total_tokens,
            "Added context message"
        );
        self.messages.push_back(message);

        self.trim();
    }

    fn trim(&mut self) {
        while self.messages.len() > self.max_messages {
            self.evict_oldest("message limit");
        }

        while self.total_tokens > self.max_tokens && self.messages.len() > MIN_RETAINED_MESSAGES {
            self.evict_oldest("token limit");
        }
    }

    fn evict_oldest(&mut self, reason: &str) {
        if let Some(removed) = self.messages.pop_front() {
            self.total_tokens -= removed.token_estimate;
            debug!(
                role = %removed.role,
                reason,
                remaining = self.messages.len(),
                total_tokens = self.total_tokens,
                "Evicted oldest context message"
            );
        }
    }

    /// Messages ready for the completion request, metadata stripped
    pub fn get_context(&self, include_system_prompt: bool) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);

        if include_system_prompt && !self.system_prompt.is_empty() {
            out.push(ChatMessage::new(Role::System, self.system_prompt.clone()));
        }

        out.extend(
            self.messages
                .iter()
                .map(|m| ChatMessage::new(m.role, m.content.clone())),
        );
        out
    }

    /// Up to `count` most recent messages, oldest first
    pub fn last_messages(&self, count: usize) -> Vec<&Message> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip).collect()
    }

    /// Drop every message; the system prompt is kept
    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
        debug!("Context cleared");
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn total_token_estimate(&self) -> usize {
        self.total_tokens
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn stats(&self) -> ContextStats {
        let system_prompt = if self.system_prompt.is_empty() {
            None
        } else {
            let preview: String = self.system_prompt.chars().take(50).collect();
            Some(format!("{}...", preview))
        };

        ContextStats {
            message_count: self.messages.len(),
            estimated_tokens: self.total_tokens,
            max_messages: self.max_messages,
            max_tokens: self.max_tokens,
            system_prompt,
        }
    }

    /// Plain-text digest of the older half of the window
    pub fn summarize(&self) -> String {
        if self.messages.len() < 3 {
            return String::new();
        }

        let half = self.messages.len() / 2;
        let lines: Vec<String> = self
            .messages
            .iter()
            .take(half)
            .map(|m| {
                let preview: String = m.content.chars().take(100).collect();
                let ellipsis = if m.content.chars().count() > 100 {
                    "..."
                } else {
                    ""
                };
                format!("{}: {}{}", m.role, preview, ellipsis)
            })
            .collect();

        format!("Previous conversation summary:\n{}", lines.join("\n"))
    }

    pub fn export(&self) -> ContextSnapshot {
        ContextSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Some(Utc::now()),
            system_prompt: self.system_prompt.clone(),
            max_messages: self.max_messages,
            max_tokens: self.max_tokens,
            messages: self
                .messages
                .iter()
                .map(|m| SnapshotMessage {
                    role: m.role,
                    content: m.content.clone(),
                    timestamp: Some(m.created_at),
                })
                .collect(),
            stats: Some(self.stats()),
        }
    }

    /// Replace the window with a snapshot.
    ///
    /// Messages are replayed through [`ContextWindow::add_message`], so an
    /// oversized snapshot loses its oldest entries.
    pub fn import(&mut self, snapshot: ContextSnapshot) -> ImportOutcome {
        self.clear();

        if !snapshot.system_prompt.is_empty() {
            self.system_prompt = snapshot.system_prompt;
        }
        if snapshot.max_messages > 0 {
            self.max_messages = snapshot.max_messages;
        }
        if snapshot.max_tokens > 0 {
            self.max_tokens = snapshot.max_tokens;
        }

        for message in &snapshot.messages {
            self.add_message(message.role, &message.content);
        }

        debug!(messages = self.messages.len(), "Imported context snapshot");

        ImportOutcome {
            success: true,
            message_count: self.messages.len(),
            error: None,
        }
    }

    /// Parse and import a JSON snapshot; an invalid payload leaves the window untouched
    pub fn import_json(&mut self, json: &str) -> ImportOutcome {
        match serde_json::from_str::<ContextSnapshot>(json) {
            Ok(snapshot) => self.import(snapshot),
            Err(e) => {
                warn!(error = %e, "Context import failed");
                ImportOutcome {
                    success: false,
                    message_count: self.messages.len(),
                    error: Some(format!("Invalid context data format: {}", e)),
                }
            }
        }
    }
}
