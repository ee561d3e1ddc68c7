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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::NodeOption;
use crate::router::mode::ChatMode;

/// Version tag written into exported history
pub const HISTORY_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    User,
    Bot,
}

/// Where a bot reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Keyword,
    Api,
    Fallback,
    Error,
}

/// One line of the append-only conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<NodeOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl HistoryEntry {
    pub fn user(content: &str) -> Self {
        Self::new(EntryType::User, content, Source::Keyword)
    }

    pub fn bot(content: &str, source: Source) -> Self {
        Self::new(EntryType::Bot, content, source)
    }

    fn new(entry_type: EntryType, content: &str, source: Source) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4().simple()),
            entry_type,
            content: content.to_string(),
            timestamp: Utc::now(),
            source,
            node_id: None,
            options: None,
            model: None,
        }
    }

    pub fn with_node(mut self, node_id: &str, options: &[NodeOption]) -> Self {
        self.node_id = Some(node_id.to_string());
        if !options.is_empty() {
            self.options = Some(options.to_vec());
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfigInfo {
    pub model: String,
    pub last_used: DateTime<Utc>,
}

/// Persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub theme_color: Option<String>,
    pub messages: Vec<HistoryEntry>,
    #[serde(default)]
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub mode: Option<ChatMode>,
    #[serde(default)]
    pub api_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_config: Option<ApiConfigInfo>,
}

impl HistorySnapshot {
    /// Versions this build knows how to read without caveats
    pub fn is_known_version(&self) -> bool {
        self.version.starts_with("1.") || self.version.starts_with("2.")
    }
}

/// Result of `load_history`; failures are reported, not raised
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOutcome {
    pub success: bool,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lightweight view of where the conversation stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub current_node_id: Option<String>,
    pub message_count: usize,
    pub last_message_timestamp: Option<DateTime<Utc>>,
}
