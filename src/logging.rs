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

use std::sync::OnceLock;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, fmt::Layer, prelude::*, registry::Registry, EnvFilter};

static FILE_LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("info,hybridbot=debug")
        } else {
            EnvFilter::new("hybridbot=info")
        }
    })
}

/// Human-readable logs on stderr for one-shot commands
pub fn init_console_logging(debug_mode: bool) {
    fmt()
        .with_env_filter(env_filter(debug_mode))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize logging for the interactive chat with daily file rotation.
/// Nothing goes to the terminal so streamed replies are not interleaved with log lines.
pub fn init_chat_logging(debug_mode: bool) -> Result<()> {
    let log_dir = crate::storage::get_log_dir()?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "chat.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    FILE_LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Chat logging already initialized"))?;

    // JSON lines for structured inspection
    let file_layer = Layer::new()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json();

    Registry::default()
        .with(file_layer)
        .with(env_filter(debug_mode))
        .init();

    info!(
        log_directory = %log_dir.display(),
        debug_mode = debug_mode,
        "Chat logging initialized"
    );

    Ok(())
}
