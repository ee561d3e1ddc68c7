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

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{
    ClientError, CompletionClient, CompletionResult, ErrorKind, ModelInfo, StreamChunk, StreamSink,
};
use crate::context::{ContextSnapshot, ContextStats, ContextWindow, Role};
use crate::knowledge::{KnowledgeBase, KnowledgeNode, NodeOption};
use crate::router::history::{
    ApiConfigInfo, ConversationState, EntryType, HistoryEntry, HistorySnapshot, LoadOutcome,
    Source, HISTORY_VERSION,
};
use crate::router::mode::{route, ChatMode, Route};

pub const FALLBACK_REPLY: &str = "I'm sorry, I didn't understand that. Can you please rephrase?";
pub const NODE_NOT_FOUND_REPLY: &str =
    "I'm sorry, I couldn't find the appropriate response. How else can I assist you?";
pub const NOT_CONFIGURED_REPLY: &str = "AI features are not configured properly.";
pub const BUSY_REPLY: &str = "Please wait for the current response to complete.";

pub const DEFAULT_BOT_NAME: &str = "Bot";
pub const DEFAULT_THEME_COLOR: &str = "#007bff";
pub const DEFAULT_HYBRID_THRESHOLD: f64 = 0.3;

/// Presentation metadata carried through history export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMetadata {
    pub bot_name: String,
    pub theme_color: String,
}

impl Default for BotMetadata {
    fn default() -> Self {
        Self {
            bot_name: DEFAULT_BOT_NAME.to_string(),
            theme_color: DEFAULT_THEME_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub mode: ChatMode,
    /// Hybrid mode answers locally only at or above this confidence
    pub hybrid_threshold: f64,
    pub streaming: bool,
    pub bot: BotMetadata,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            mode: ChatMode::KeywordOnly,
            hybrid_threshold: DEFAULT_HYBRID_THRESHOLD,
            streaming: true,
            bot: BotMetadata::default(),
        }
    }
}

/// Completion client and the context window it reads from; present together or not at all
pub struct AiBackend {
    pub client: Arc<dyn CompletionClient>,
    pub context: ContextWindow,
}

impl AiBackend {
    pub fn new(client: Arc<dyn CompletionClient>, context: ContextWindow) -> Self {
        Self { client, context }
    }
}

/// Reply handed back to the caller for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<NodeOption>>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl BotReply {
    fn text(reply: &str, source: Source) -> Self {
        Self {
            reply: reply.to_string(),
            options: None,
            source,
            confidence: None,
            model: None,
        }
    }

    fn from_node(node: &KnowledgeNode, confidence: Option<f64>) -> Self {
        Self {
            reply: node.reply.clone(),
            options: if node.options.is_empty() {
                None
            } else {
                Some(node.options.clone())
            },
            source: Source::Keyword,
            confidence,
            model: None,
        }
    }
}

/// Caller-side hooks for an AI reply
pub trait ResponseObserver: Send {
    /// Fires once, when the first chunk arrives
    fn on_start(&mut self) {}
    fn on_chunk(&mut self, _chunk: &StreamChunk) {}
    fn on_complete(&mut self, _result: &CompletionResult) {}
    fn on_error(&mut self, _error: &ClientError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResponseObserver for NoopObserver {}

/// Adapts a [`ResponseObserver`] to the client's sink, firing `on_start` lazily
struct ObserverSink<'a> {
    observer: &'a mut dyn ResponseObserver,
    started: bool,
}

impl StreamSink for ObserverSink<'_> {
    fn on_chunk(&mut self, chunk: &StreamChunk) {
        if !self.started {
            self.started = true;
            self.observer.on_start();
        }
        self.observer.on_chunk(chunk);
    }
}

/// Empties the single-flight slot on every exit path
struct InFlight<'a>(&'a Mutex<Option<CancellationToken>>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub enabled: bool,
    pub mode: ChatMode,
    pub streaming: bool,
    pub model: Option<ModelInfo>,
    pub context_stats: Option<ContextStats>,
    pub response_in_progress: bool,
}

struct DialogueState {
    history: Vec<HistoryEntry>,
    current_node: Option<String>,
    context: Option<ContextWindow>,
    bot: BotMetadata,
}

/// Text shown to the user when an AI reply fails
pub fn user_facing_error(error: &ClientError) -> String {
    match error.kind() {
        ErrorKind::Auth => {
            "⚠️ API authentication failed. Please check your API key configuration.".to_string()
        }
        ErrorKind::RateLimit => "⚠️ Too many requests. Please wait a moment and try again.".to_string(),
        ErrorKind::Cancelled => "Response cancelled.".to_string(),
        ErrorKind::ServerUnavailable => {
            "⚠️ The AI service is temporarily unavailable. Please try again later.".to_string()
        }
        ErrorKind::Interrupted => {
            "⚠️ The response was interrupted before it finished. Please try again.".to_string()
        }
        _ => format!("⚠️ An error occurred: {}", error),
    }
}

/// Routes each user turn to a canned reply or the completion provider,
/// keeping history and context in step.
///
/// One router serves one conversation. At most one AI request runs at a
/// time; a second request made meanwhile is declined, not queued.
pub struct DialogueRouter {
    knowledge: KnowledgeBase,
    settings: RouterSettings,
    client: Option<Arc<dyn CompletionClient>>,
    state: Mutex<DialogueState>,
    /// Cancel handle of the running AI request; `Some` while one is in flight
    in_flight: Mutex<Option<CancellationToken>>,
}

impl DialogueRouter {
    pub fn new(knowledge: KnowledgeBase, settings: RouterSettings, backend: Option<AiBackend>) -> Self {
        let (client, context) = match backend {
            Some(backend) => (Some(backend.client), Some(backend.context)),
            None => (None, None),
        };

        if client.is_none() && settings.mode != ChatMode::KeywordOnly {
            warn!(mode = %settings.mode, "No completion client configured, AI routes are unavailable");
        }

        let bot = settings.bot.clone();
        Self {
            knowledge,
            settings,
            client,
            state: Mutex::new(DialogueState {
                history: Vec::new(),
                current_node: None,
                context,
                bot,
            }),
            in_flight: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.settings.mode
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_response_in_progress(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Start the conversation at the entry node
    pub fn init(&self) -> BotReply {
        let node = self.knowledge.entry_node();
        self.record_node(node);
        BotReply::from_node(node, None)
    }

    pub async fn handle_input(&self, text: &str, observer: &mut dyn ResponseObserver) -> BotReply {
        {
            let mut state = self.state.lock();
            state.history.push(HistoryEntry::user(text));
            if let Some(context) = state.context.as_mut() {
                context.add_message(Role::User, text);
            }
        }

        let result = self.knowledge.match_input(text);
        let node = result.node_id.as_deref().and_then(|id| self.knowledge.get(id));
        let confident = result.confidence >= self.settings.hybrid_threshold;
        let decision = route(self.settings.mode, self.client.is_some(), node.is_some(), confident);

        debug!(
            mode = %self.settings.mode,
            best_match = result.node_id.as_deref().unwrap_or("none"),
            score = result.score,
            confidence = result.confidence,
            threshold = self.settings.hybrid_threshold,
            route = ?decision,
            "Routed user input"
        );

        match (decision, node) {
            (Route::Matched, Some(node)) => {
                self.record_node(node);
                if let Some(context) = self.state.lock().context.as_mut() {
                    context.add_message(Role::Assistant, &node.reply);
                }
                BotReply::from_node(node, Some(result.confidence))
            }
            (Route::Ai, _) => self.handle_ai_response(observer).await,
            (Route::ConfigurationError, _) => {
                self.record(HistoryEntry::bot(NOT_CONFIGURED_REPLY, Source::Error));
                BotReply::text(NOT_CONFIGURED_REPLY, Source::Error)
            }
            _ => {
                self.record(HistoryEntry::bot(FALLBACK_REPLY, Source::Fallback));
                BotReply::text(FALLBACK_REPLY, Source::Fallback)
            }
        }
    }

    async fn handle_ai_response(&self, observer: &mut dyn ResponseObserver) -> BotReply {
        let Some(client) = self.client.as_ref() else {
            return BotReply::text(NOT_CONFIGURED_REPLY, Source::Error);
        };

        // The token is published together with the busy marker, so a cancel
        // arriving before the client starts still reaches the request.
        let token = {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                warn!("AI response already in progress, declining new request");
                return BotReply::text(BUSY_REPLY, Source::Error);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _flight = InFlight(&self.in_flight);

        let messages = self
            .state
            .lock()
            .context
            .as_ref()
            .map(|c| c.get_context(true))
            .unwrap_or_default();

        let outcome = {
            let mut sink = ObserverSink {
                observer: &mut *observer,
                started: false,
            };
            client.send_message_with_cancel(&messages, &mut sink, token).await
        };

        match outcome {
            Ok(result) => {
                {
                    let mut state = self.state.lock();
                    state
                        .history
                        .push(HistoryEntry::bot(&result.content, Source::Api).with_model(&result.model));
                    if let Some(context) = state.context.as_mut() {
                        context.add_message(Role::Assistant, &result.content);
                    }
                }
                info!(model = %result.model, chars = result.content.len(), "AI response completed");
                observer.on_complete(&result);

                BotReply {
                    reply: result.content,
                    options: None,
                    source: Source::Api,
                    confidence: None,
                    model: Some(result.model),
                }
            }
            Err(error) => {
                warn!(error = %error, kind = ?error.kind(), "AI response failed");
                let message = user_facing_error(&error);
                self.record(HistoryEntry::bot(&message, Source::Error));
                observer.on_error(&error);
                BotReply::text(&message, Source::Error)
            }
        }
    }

    /// Abort the running AI request. Returns whether there was one.
    pub fn cancel_ai_response(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                info!("AI response cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Follow an option edge of the knowledge graph
    pub fn handle_option_selection(&self, target_id: &str) -> BotReply {
        match self.knowledge.get(target_id) {
            Some(node) => {
                self.record_node(node);
                BotReply::from_node(node, None)
            }
            None => {
                debug!(target_id, "Option points to an unknown node");
                self.record(HistoryEntry::bot(NODE_NOT_FOUND_REPLY, Source::Fallback));
                BotReply::text(NODE_NOT_FOUND_REPLY, Source::Fallback)
            }
        }
    }

    fn record(&self, entry: HistoryEntry) {
        self.state.lock().history.push(entry);
    }

    fn record_node(&self, node: &KnowledgeNode) {
        let mut state = self.state.lock();
        state.current_node = Some(node.id.clone());
        state
            .history
            .push(HistoryEntry::bot(&node.reply, Source::Keyword).with_node(&node.id, &node.options));
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.clone()
    }

    pub fn history_snapshot(&self) -> HistorySnapshot {
        let state = self.state.lock();
        HistorySnapshot {
            version: HISTORY_VERSION.to_string(),
            timestamp: Some(Utc::now()),
            bot_name: Some(state.bot.bot_name.clone()),
            theme_color: Some(state.bot.theme_color.clone()),
            messages: state.history.clone(),
            current_node_id: state.current_node.clone(),
            mode: Some(self.settings.mode),
            api_enabled: self.client.is_some(),
            api_config: self.client.as_ref().map(|client| ApiConfigInfo {
                model: client.model_info().model,
                last_used: Utc::now(),
            }),
        }
    }

    /// Pretty-printed JSON of [`DialogueRouter::history_snapshot`]
    pub fn export_history(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.history_snapshot())
    }

    /// Restore a conversation exported by [`DialogueRouter::export_history`]
    pub fn load_history(&self, json: &str) -> LoadOutcome {
        match serde_json::from_str::<HistorySnapshot>(json) {
            Ok(snapshot) => self.load_snapshot(snapshot),
            Err(e) => {
                warn!(error = %e, "Failed to load history");
                LoadOutcome {
                    success: false,
                    message_count: 0,
                    error: Some(format!("Invalid history format: {}", e)),
                }
            }
        }
    }

    pub fn load_snapshot(&self, snapshot: HistorySnapshot) -> LoadOutcome {
        if !snapshot.is_known_version() {
            warn!(version = %snapshot.version, "History version may not be fully compatible");
        }

        let mut state = self.state.lock();

        if let Some(name) = snapshot.bot_name {
            state.bot.bot_name = name;
        }
        if let Some(color) = snapshot.theme_color {
            state.bot.theme_color = color;
        }

        if let Some(node_id) = snapshot.current_node_id.as_deref() {
            if self.knowledge.get(node_id).is_some() {
                state.current_node = Some(node_id.to_string());
            }
        }

        let DialogueState {
            history, context, ..
        } = &mut *state;
        *history = snapshot.messages;

        if let Some(context) = context.as_mut() {
            context.clear();
            for entry in history.iter() {
                let role = match entry.entry_type {
                    EntryType::User => Role::User,
                    EntryType::Bot => Role::Assistant,
                };
                context.add_message(role, &entry.content);
            }
        }

        info!(messages = history.len(), "History loaded");
        LoadOutcome {
            success: true,
            message_count: history.len(),
            error: None,
        }
    }

    /// Start over at the entry node; the context window is emptied too
    pub fn clear_history(&self) -> BotReply {
        {
            let mut state = self.state.lock();
            state.history.clear();
            if let Some(context) = state.context.as_mut() {
                context.clear();
            }
        }
        self.init()
    }

    pub fn current_state(&self) -> ConversationState {
        let state = self.state.lock();
        ConversationState {
            current_node_id: state.current_node.clone(),
            message_count: state.history.len(),
            last_message_timestamp: state.history.last().map(|e| e.timestamp),
        }
    }

    pub fn get_api_status(&self) -> ApiStatus {
        let state = self.state.lock();
        ApiStatus {
            enabled: self.client.is_some(),
            mode: self.settings.mode,
            streaming: self.settings.streaming,
            model: self.client.as_ref().map(|c| c.model_info()),
            context_stats: state.context.as_ref().map(|c| c.stats()),
            response_in_progress: self.is_response_in_progress(),
        }
    }

    pub fn export_context(&self) -> Option<ContextSnapshot> {
        self.state.lock().context.as_ref().map(|c| c.export())
    }

    pub fn context_summary(&self) -> Option<String> {
        self.state.lock().context.as_ref().map(|c| c.summarize())
    }
}
