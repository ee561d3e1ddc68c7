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

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use hybridbot::client::{ClientError, CompletionResult, StreamChunk};
use hybridbot::config::Config;
use hybridbot::knowledge::{KnowledgeBase, NodeOption};
use hybridbot::router::{
    AiBackend, BotReply, ChatMode, DialogueRouter, NoopObserver, ResponseObserver, Source,
};
use hybridbot::StreamingClient;

use crate::cli::{Commands, OutputFormat};
use crate::formatting;

pub async fn execute(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Chat { mode, history } => run_chat(config, mode, history).await,
        Commands::Ask { text, mode, format } => run_ask(config, &text.join(" "), mode, format).await,
        Commands::Match { text } => run_match(config, &text.join(" ")),
        Commands::Nodes => {
            let knowledge = load_knowledge(config)?;
            print!("{}", formatting::format_nodes(knowledge.nodes()));
            Ok(())
        }
        Commands::Config => show_config(config),
    }
}

fn load_knowledge(config: &Config) -> Result<KnowledgeBase> {
    match &config.knowledge.path {
        Some(path) => KnowledgeBase::from_json_file(path),
        None => Ok(KnowledgeBase::default()),
    }
}

fn build_router(config: &Config, mode_override: Option<ChatMode>) -> Result<DialogueRouter> {
    let knowledge = load_knowledge(config)?;
    let settings = config.router_settings(mode_override);

    let backend = match config.resolve_api_key() {
        Some(key) => {
            let client = StreamingClient::new(config.client_config(key))?;
            Some(AiBackend::new(Arc::new(client), config.context_window()))
        }
        None => None,
    };

    debug!(mode = %settings.mode, ai = backend.is_some(), nodes = knowledge.nodes().len(), "Router ready");
    Ok(DialogueRouter::new(knowledge, settings, backend))
}

async fn run_ask(config: &Config, text: &str, mode: Option<ChatMode>, format: OutputFormat) -> Result<()> {
    let router = build_router(config, mode)?;
    let reply = router.handle_input(text, &mut NoopObserver).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
        OutputFormat::Text => {
            print!("{}", formatting::format_reply(&config.bot.name, &reply));
            println!("{}", formatting::format_source_tag(&reply));
        }
    }

    if reply.source == Source::Error {
        anyhow::bail!("{}", reply.reply);
    }
    Ok(())
}

fn run_match(config: &Config, text: &str) -> Result<()> {
    let knowledge = load_knowledge(config)?;
    let result = knowledge.match_input(text);
    let node = result.node_id.as_deref().and_then(|id| knowledge.get(id));
    print!("{}", formatting::format_match(text, &result, node));
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if let Some(key) = shown.api.api_key.as_mut() {
        *key = mask_key(key);
    }
    println!("{}", toml::to_string_pretty(&shown)?);

    let source = if hybridbot::config::API_KEY_ENV_VARS
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty()))
    {
        "environment"
    } else if config.resolve_api_key().is_some() {
        "config file"
    } else {
        "not set"
    };
    println!("# API key: {}", source);
    Ok(())
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(6).collect();
    format!("{}…", visible)
}

/// Prints streamed deltas as they arrive
struct StreamPrinter {
    bot_name: String,
    streamed: bool,
}

impl ResponseObserver for StreamPrinter {
    fn on_start(&mut self) {
        self.streamed = true;
        print!("{} ", format!("{}:", self.bot_name).blue().bold());
        let _ = std::io::stdout().flush();
    }

    fn on_chunk(&mut self, chunk: &StreamChunk) {
        print!("{}", chunk.delta_content);
        let _ = std::io::stdout().flush();
    }

    fn on_complete(&mut self, _result: &CompletionResult) {
        if self.streamed {
            println!();
        }
    }

    fn on_error(&mut self, _error: &ClientError) {
        if self.streamed {
            println!();
        }
    }
}

struct ChatSession<'a> {
    config: &'a Config,
    router: DialogueRouter,
    last_options: Vec<NodeOption>,
}

impl ChatSession<'_> {
    fn show(&mut self, reply: &BotReply) {
        print!("{}", formatting::format_reply(&self.config.bot.name, reply));
        self.remember_options(reply);
    }

    fn remember_options(&mut self, reply: &BotReply) {
        self.last_options = reply.options.clone().unwrap_or_default();
    }

    async fn turn(&mut self, text: &str) {
        let mut printer = StreamPrinter {
            bot_name: self.config.bot.name.clone(),
            streamed: false,
        };

        let reply = {
            let router = &self.router;
            let pending = router.handle_input(text, &mut printer);
            tokio::pin!(pending);
            loop {
                tokio::select! {
                    reply = &mut pending => break reply,
                    _ = tokio::signal::ctrl_c() => {
                        if router.cancel_ai_response() {
                            info!("AI response cancelled from the terminal");
                        }
                    }
                }
            }
        };

        if printer.streamed && reply.source == Source::Api {
            self.remember_options(&reply);
        } else {
            self.show(&reply);
        }
        println!("{}", formatting::format_source_tag(&reply));
    }

    /// Returns false when the session should end
    fn command(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match name {
            "/quit" | "/exit" => return Ok(false),
            "/help" => print_help(),
            "/status" => {
                let status = self.router.get_api_status();
                let state = self.router.current_state();
                print!("{}", formatting::format_status(&status, &state));
            }
            "/clear" => {
                let reply = self.router.clear_history();
                self.show(&reply);
            }
            "/summary" => match self.router.context_summary() {
                Some(summary) => println!("{}", summary),
                None => println!("{}", "No AI context in this session".yellow()),
            },
            "/export" => {
                let path = match arg {
                    Some(path) => PathBuf::from(path),
                    None => default_export_path()?,
                };
                let json = self.router.export_history()?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Conversation saved to {}", path.display().to_string().green());
            }
            "/load" => match arg {
                Some(path) => self.load(Path::new(path))?,
                None => println!("Usage: /load <file>"),
            },
            other => println!("Unknown command {}, try /help", other.yellow()),
        }
        Ok(true)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let outcome = self.router.load_history(&json);
        if outcome.success {
            println!("Loaded {} messages from {}", outcome.message_count, path.display());
            self.last_options = self
                .router
                .history()
                .last()
                .and_then(|entry| entry.options.clone())
                .unwrap_or_default();
            if !self.last_options.is_empty() {
                print!("{}", formatting::format_options(&self.last_options));
            }
        } else {
            println!(
                "{}",
                outcome
                    .error
                    .unwrap_or_else(|| "Failed to load history".to_string())
                    .red()
            );
        }
        Ok(())
    }

    fn selected_option(&self, line: &str) -> Option<String> {
        let index: usize = line.parse().ok()?;
        self.last_options
            .get(index.checked_sub(1)?)
            .map(|option| option.target_id.clone())
    }
}

async fn run_chat(config: &Config, mode: Option<ChatMode>, history: Option<PathBuf>) -> Result<()> {
    let router = build_router(config, mode)?;
    let mut session = ChatSession {
        config,
        router,
        last_options: Vec::new(),
    };

    println!("{}", "━".repeat(60));
    println!(
        "{} {}",
        config.bot.name.bold(),
        format!("({} mode, /help for commands)", session.router.mode()).bright_black()
    );
    println!("{}", "━".repeat(60));

    match history {
        Some(path) => session.load(&path)?,
        None => {
            let reply = session.router.init();
            session.show(&reply);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match session.command(line) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    println!("{}", format!("Error: {}", e).red());
                    continue;
                }
            }
        }

        if let Some(target) = session.selected_option(line) {
            let reply = session.router.handle_option_selection(&target);
            session.show(&reply);
            continue;
        }

        session.turn(line).await;
    }

    println!("Goodbye!");
    Ok(())
}

fn default_export_path() -> Result<PathBuf> {
    let name = format!("chat-{}.json", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
    Ok(hybridbot::storage::get_history_dir()?.join(name))
}

fn print_help() {
    println!("Type a message to chat, or the number of an option to follow it.");
    println!("  /status         AI and context status");
    println!("  /summary        Summary of the AI context window");
    println!("  /clear          Start the conversation over");
    println!("  /export [file]  Save the conversation as JSON");
    println!("  /load <file>    Restore a saved conversation");
    println!("  /quit           Leave");
    println!("Press Ctrl+C while the bot is answering to cancel the reply.");
}
