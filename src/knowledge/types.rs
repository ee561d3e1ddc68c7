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

use serde::{Deserialize, Serialize};

/// A follow-up choice offered together with a node's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOption {
    pub label: String,
    /// Id of the node this option leads to
    #[serde(rename = "targetId", alias = "reply_id", alias = "target_id")]
    pub target_id: String,
}

impl NodeOption {
    pub fn new(label: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_id: target_id.into(),
        }
    }
}

/// One entry of the static knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    #[serde(alias = "keyword")]
    pub keywords: Vec<String>,
    pub reply: String,
    #[serde(default)]
    pub options: Vec<NodeOption>,
}

impl KnowledgeNode {
    pub fn new(id: &str, keywords: &[&str], reply: &str, options: Vec<NodeOption>) -> Self {
        Self {
            id: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            reply: reply.to_string(),
            options,
        }
    }
}

/// Outcome of scoring one input against the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub node_id: Option<String>,
    pub score: u32,
    pub confidence: f64,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            node_id: None,
            score: 0,
            confidence: 0.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.node_id.is_some()
    }
}
