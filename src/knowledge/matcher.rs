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

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::knowledge::types::{KnowledgeNode, MatchResult};

/// Node id preferred as the conversation entry point
pub const WELCOME_NODE_ID: &str = "welcome";

/// Confidence for a raw keyword score.
/// A single hit maps to 0.5, each further hit adds 0.1, capped at 1.0.
pub fn confidence_for_score(score: u32) -> f64 {
    if score == 0 {
        return 0.0;
    }
    (0.5 + f64::from(score - 1) * 0.1).min(1.0)
}

/// Score `input` against every node and pick the best candidate.
///
/// Each (keyword, word) pair counts once when either string contains the
/// other, so partial words and plurals still hit. Ties keep the earliest node.
pub fn match_input(input: &str, nodes: &[KnowledgeNode]) -> MatchResult {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() {
        return MatchResult::no_match();
    }

    let mut best: Option<&KnowledgeNode> = None;
    let mut best_score = 0u32;

    for node in nodes {
        let score = score_node(node, &words);
        if score > best_score {
            best_score = score;
            best = Some(node);
        }
    }

    match best {
        Some(node) => MatchResult {
            node_id: Some(node.id.clone()),
            score: best_score,
            confidence: confidence_for_score(best_score),
        },
        None => MatchResult::no_match(),
    }
}

fn score_node(node: &KnowledgeNode, words: &[&str]) -> u32 {
    let mut score = 0;
    for keyword in &node.keywords {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            continue;
        }
        for word in words {
            if word.contains(keyword.as_str()) || keyword.contains(word) {
                score += 1;
            }
        }
    }
    score
}

/// Immutable, ordered set of knowledge nodes
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    nodes: Vec<KnowledgeNode>,
}

impl KnowledgeBase {
    pub fn new(nodes: Vec<KnowledgeNode>) -> Result<Self> {
        if nodes.is_empty() {
            anyhow::bail!("Knowledge base must contain at least one node");
        }

        for (i, node) in nodes.iter().enumerate() {
            if nodes[..i].iter().any(|n| n.id == node.id) {
                warn!(node_id = %node.id, "Duplicate knowledge node id, first one wins on lookup");
            }
        }

        Ok(Self { nodes })
    }

    /// Load nodes from a JSON array on disk
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge base {}", path.display()))?;
        let nodes: Vec<KnowledgeNode> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid knowledge base file {}", path.display()))?;
        Self::new(nodes)
    }

    pub fn nodes(&self) -> &[KnowledgeNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// The `welcome` node, or the first node when there is none
    pub fn entry_node(&self) -> &KnowledgeNode {
        self.get(WELCOME_NODE_ID).unwrap_or(&self.nodes[0])
    }

    pub fn match_input(&self, input: &str) -> MatchResult {
        match_input(input, &self.nodes)
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            nodes: crate::knowledge::defaults::default_nodes(),
        }
    }
}
