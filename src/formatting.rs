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

use colored::Colorize;

use hybridbot::knowledge::{KnowledgeNode, MatchResult, NodeOption};
use hybridbot::router::history::ConversationState;
use hybridbot::router::{ApiStatus, BotReply, Source};

pub fn format_reply(bot_name: &str, reply: &BotReply) -> String {
    let mut output = String::new();

    output.push_str(&format!("{} ", format!("{}:", bot_name).blue().bold()));
    let text = match reply.source {
        Source::Error => reply.reply.yellow().to_string(),
        Source::Fallback => reply.reply.italic().to_string(),
        _ => reply.reply.clone(),
    };
    output.push_str(&text);
    output.push('\n');

    if let Some(options) = &reply.options {
        output.push_str(&format_options(options));
    }

    output
}

pub fn format_options(options: &[NodeOption]) -> String {
    let mut output = String::new();
    for (i, option) in options.iter().enumerate() {
        output.push_str(&format!("  {} {}\n", format!("[{}]", i + 1).cyan(), option.label));
    }
    output
}

pub fn format_source_tag(reply: &BotReply) -> String {
    let mut tag = match reply.source {
        Source::Keyword => "knowledge base",
        Source::Api => "ai",
        Source::Fallback => "fallback",
        Source::Error => "error",
    }
    .to_string();
    if let Some(confidence) = reply.confidence {
        tag.push_str(&format!(", {:.0}% confidence", confidence * 100.0));
    }
    if let Some(model) = &reply.model {
        tag.push_str(&format!(", {}", model));
    }
    format!("({})", tag).bright_black().to_string()
}

pub fn format_match(input: &str, result: &MatchResult, node: Option<&KnowledgeNode>) -> String {
    let mut output = String::new();

    output.push_str(&format!("Input: {}\n", input.bold()));
    match node {
        Some(node) => {
            output.push_str(&format!("Best match: {}\n", node.id.green().bold()));
            output.push_str(&format!("Score: {}\n", result.score));
            output.push_str(&format!("Confidence: {:.2}\n", result.confidence));
            output.push_str(&format!("Reply: {}\n", node.reply));
        }
        None => {
            output.push_str(&"No keyword match".yellow().to_string());
            output.push('\n');
        }
    }

    output
}

pub fn format_nodes(nodes: &[KnowledgeNode]) -> String {
    let mut output = String::new();

    for node in nodes {
        output.push_str(&"━".repeat(60));
        output.push('\n');
        output.push_str(&node.id.blue().bold().to_string());
        output.push('\n');
        output.push_str(&format!("Keywords: {}", node.keywords.join(", ")).cyan().to_string());
        output.push('\n');
        output.push_str(&node.reply);
        output.push('\n');

        if !node.options.is_empty() {
            let edges: Vec<String> = node
                .options
                .iter()
                .map(|o| format!("{} → {}", o.label, o.target_id))
                .collect();
            output.push_str(&edges.join(" | ").bright_black().to_string());
            output.push('\n');
        }
    }

    output
}

pub fn format_status(status: &ApiStatus, state: &ConversationState) -> String {
    let mut output = String::new();

    output.push_str(&"Conversation Status".bold().to_string());
    output.push('\n');
    output.push_str(&format!("Mode: {}\n", status.mode));
    output.push_str(&format!(
        "AI: {}\n",
        if status.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        }
    ));

    if let Some(model) = &status.model {
        output.push_str(&format!(
            "Model: {} (max {} tokens, temperature {})\n",
            model.model, model.max_tokens, model.temperature
        ));
    }

    if let Some(stats) = &status.context_stats {
        output.push_str(&format!(
            "Context: {}/{} messages, ~{}/{} tokens\n",
            stats.message_count, stats.max_messages, stats.estimated_tokens, stats.max_tokens
        ));
    }

    output.push_str(&format!("History: {} messages\n", state.message_count));
    if let Some(node) = &state.current_node_id {
        output.push_str(&format!("Current node: {}\n", node));
    }

    output
}
