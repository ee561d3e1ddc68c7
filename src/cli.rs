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

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hybridbot::ChatMode;

#[derive(Parser, Debug)]
#[command(name = "hybridbot")]
#[command(version, author = "Muvon Un Limited <opensource@muvon.io>")]
#[command(about = "Keyword knowledge base and streaming LLM chat, blended by confidence", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the one in the data directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation
    Chat {
        /// Routing mode: keyword-only, ai-only or hybrid (overrides config)
        #[arg(short, long)]
        mode: Option<ChatMode>,

        /// Resume a conversation exported earlier
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Answer a single message and exit
    Ask {
        /// Message to send
        #[arg(required = true)]
        text: Vec<String>,

        /// Routing mode: keyword-only, ai-only or hybrid (overrides config)
        #[arg(short, long)]
        mode: Option<ChatMode>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show how a message scores against the knowledge base
    Match {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List knowledge base nodes
    Nodes,

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
