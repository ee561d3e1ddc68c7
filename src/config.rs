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

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::{ClientConfig, RetryConfig};
use crate::context::ContextWindow;
use crate::router::{BotMetadata, ChatMode, RouterSettings};

const DEFAULT_TEMPLATE: &str = include_str!("../config-templates/default.toml");

/// Environment variables checked for the API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["HYBRIDBOT_API_KEY", "OPENROUTER_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    pub theme_color: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        let meta = BotMetadata::default();
        Self {
            name: meta.bot_name,
            theme_color: meta.theme_color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub mode: ChatMode,
    pub hybrid_threshold: f64,
    pub streaming: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::Hybrid,
            hybrid_threshold: crate::router::dialogue::DEFAULT_HYBRID_THRESHOLD,
            streaming: true,
        }
    }
}

/// Completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub site_name: String,
    #[serde(default)]
    pub site_url: String,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        use crate::client::openrouter::{
            DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SITE_NAME,
            DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
        };
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            site_name: DEFAULT_SITE_NAME.to_string(),
            site_url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_attempts: 2,
            retry_delay_ms: 1000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub system_prompt: String,
    pub max_messages: usize,
    pub max_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        use crate::context::window::{
            DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT,
        };
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_messages: DEFAULT_MAX_MESSAGES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Main configuration for hybridbot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl Config {
    /// Load configuration from config.toml file
    /// First tries the system config directory, falls back to the embedded template
    pub fn load() -> Result<Self> {
        let config_path = crate::storage::get_system_config_path()?;

        let config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config: Self = toml::from_str(DEFAULT_TEMPLATE)?;

            if let Some(parent) = config_path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&config_path, DEFAULT_TEMPLATE)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.router.hybrid_threshold) {
            anyhow::bail!(
                "router.hybrid_threshold must be between 0 and 1, got {}",
                self.router.hybrid_threshold
            );
        }
        if self.context.max_messages == 0 {
            anyhow::bail!("context.max_messages must be at least 1");
        }
        if self.context.max_tokens == 0 {
            anyhow::bail!("context.max_tokens must be at least 1");
        }
        if self.api.timeout_ms == 0 {
            anyhow::bail!("api.timeout_ms must be greater than 0");
        }
        Ok(())
    }

    /// API key from the environment, falling back to the config file
    pub fn resolve_api_key(&self) -> Option<String> {
        API_KEY_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .or_else(|| self.api.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn client_config(&self, api_key: String) -> ClientConfig {
        let site_url = Some(self.api.site_url.clone()).filter(|u| !u.is_empty());
        let mut config = ClientConfig::new(api_key)
            .with_base_url(self.api.base_url.clone())
            .with_model(self.api.model.clone())
            .with_timeout(Duration::from_millis(self.api.timeout_ms))
            .with_retry(RetryConfig::new(
                self.api.retry_attempts,
                Duration::from_millis(self.api.retry_delay_ms),
            ))
            .with_streaming(self.router.streaming)
            .with_site(self.api.site_name.clone(), site_url);
        config.max_tokens = self.api.max_tokens;
        config.temperature = self.api.temperature;
        config
    }

    pub fn context_window(&self) -> ContextWindow {
        ContextWindow::new(
            self.context.system_prompt.clone(),
            self.context.max_messages,
            self.context.max_tokens,
        )
    }

    pub fn router_settings(&self, mode_override: Option<ChatMode>) -> RouterSettings {
        RouterSettings {
            mode: mode_override.unwrap_or(self.router.mode),
            hybrid_threshold: self.router.hybrid_threshold,
            streaming: self.router.streaming,
            bot: BotMetadata {
                bot_name: self.bot.name.clone(),
                theme_color: self.bot.theme_color.clone(),
            },
        }
    }
}
