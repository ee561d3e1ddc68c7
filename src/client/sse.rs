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

//! Incremental decoding of `text/event-stream` completion bodies.

use serde::Deserialize;
use tracing::debug;

use crate::client::error::ClientError;
use crate::client::types::StreamChunk;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Reassembles lines from network chunks that may split anywhere,
/// including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One decoded event line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Delta {
        content: Option<String>,
        finish_reason: Option<String>,
    },
    Done,
    Ignored,
}

/// Decode a single line of the event stream
pub fn parse_line(line: &str) -> Result<Frame, ClientError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Frame::Ignored);
    }

    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(Frame::Ignored);
    };
    let data = data.trim_start();
    if data == DONE_MARKER {
        return Ok(Frame::Done);
    }

    let payload: StreamPayload =
        serde_json::from_str(data).map_err(|e| ClientError::Parse(e.to_string()))?;
    let first = payload.choices.into_iter().next();

    Ok(match first {
        Some(choice) => Frame::Delta {
            content: choice.delta.and_then(|d| d.content),
            finish_reason: choice.finish_reason,
        },
        None => Frame::Delta {
            content: None,
            finish_reason: None,
        },
    })
}

/// Accumulates streamed deltas into the full reply
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line; returns the chunk to report when it carried text.
    /// Malformed frames are logged and skipped.
    pub fn apply_line(&mut self, line: &str) -> Option<StreamChunk> {
        match parse_line(line) {
            Ok(Frame::Delta {
                content,
                finish_reason,
            }) => {
                if let Some(reason) = finish_reason {
                    debug!(finish_reason = %reason, "Stream reported finish reason");
                    self.finish_reason = Some(reason);
                }
                let delta = content.filter(|c| !c.is_empty())?;
                self.content.push_str(&delta);
                Some(StreamChunk {
                    delta_content: delta,
                    accumulated_content: self.content.clone(),
                    done: false,
                })
            }
            Ok(Frame::Done) | Ok(Frame::Ignored) => None,
            Err(e) => {
                debug!(error = %e, line = %line.trim(), "Skipping malformed stream frame");
                None
            }
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn into_content(self) -> String {
        self.content
    }
}
