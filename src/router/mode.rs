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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the router chooses between canned replies and the completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    #[default]
    KeywordOnly,
    AiOnly,
    Hybrid,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::KeywordOnly => write!(f, "keyword-only"),
            ChatMode::AiOnly => write!(f, "ai-only"),
            ChatMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword-only" | "keyword" => Ok(ChatMode::KeywordOnly),
            "ai-only" | "ai" => Ok(ChatMode::AiOnly),
            "hybrid" => Ok(ChatMode::Hybrid),
            other => Err(format!(
                "Unknown mode '{}', expected keyword-only, ai-only or hybrid",
                other
            )),
        }
    }
}

/// Where a single user input gets answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Reply with the matched node
    Matched,
    /// Reply with the generic "didn't understand" text
    Fallback,
    /// Ask the completion provider
    Ai,
    /// AI was requested but no client is configured
    ConfigurationError,
}

/// Routing decision table.
///
/// `confident` is only consulted in hybrid mode with a client and a match.
pub fn route(mode: ChatMode, ai_configured: bool, has_match: bool, confident: bool) -> Route {
    match (mode, ai_configured, has_match) {
        (ChatMode::KeywordOnly, _, true) => Route::Matched,
        (ChatMode::KeywordOnly, _, false) => Route::Fallback,
        (ChatMode::AiOnly, true, _) => Route::Ai,
        (ChatMode::AiOnly, false, _) => Route::ConfigurationError,
        (ChatMode::Hybrid, true, true) if confident => Route::Matched,
        (ChatMode::Hybrid, true, _) => Route::Ai,
        (ChatMode::Hybrid, false, true) => Route::Matched,
        (ChatMode::Hybrid, false, false) => Route::Fallback,
    }
}
