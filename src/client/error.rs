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

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Classification tag driving retry and user-messaging policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Auth,
    BadRequest,
    RateLimit,
    ServerUnavailable,
    Http,
    Network,
    Timeout,
    Cancelled,
    Interrupted,
    Parse,
}

/// Errors raised by the completion client.
///
/// The kind is fixed where the error is created (status code, abort reason)
/// and never re-derived from the message text.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid API key. Please check your API key.")]
    Unauthorized,

    #[error("Access forbidden. Please check your API key permissions.")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("The completion service is temporarily unavailable (HTTP {status}). Please try again.")]
    ServerUnavailable { status: u16 },

    #[error("API error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request cancelled by user")]
    Cancelled,

    /// The stream broke after text had already reached the caller
    #[error("Stream interrupted after {delivered_chars} characters: {reason}")]
    StreamInterrupted { delivered_chars: usize, reason: String },

    #[error("Malformed stream frame: {0}")]
    Parse(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Configuration(_) => ErrorKind::Configuration,
            ClientError::Unauthorized | ClientError::Forbidden => ErrorKind::Auth,
            ClientError::BadRequest(_) => ErrorKind::BadRequest,
            ClientError::RateLimited { .. } => ErrorKind::RateLimit,
            ClientError::ServerUnavailable { .. } => ErrorKind::ServerUnavailable,
            ClientError::Http { .. } => ErrorKind::Http,
            ClientError::Network(_) => ErrorKind::Network,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Cancelled => ErrorKind::Cancelled,
            ClientError::StreamInterrupted { .. } => ErrorKind::Interrupted,
            ClientError::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Rate limits go through the ordinary backoff path; `Retry-After` is
    /// recorded but not honoured. An interrupted stream is final because a
    /// new attempt would replay text the caller already has.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Configuration
                | ErrorKind::Auth
                | ErrorKind::BadRequest
                | ErrorKind::Cancelled
                | ErrorKind::Interrupted
        )
    }

    /// Mark a failure that happened after `delivered` text was streamed.
    /// Errors before the first chunk, and non-retryable ones, pass through.
    pub fn after_delivery(self, delivered: &str) -> Self {
        if delivered.is_empty() || !self.is_retryable() {
            return self;
        }
        ClientError::StreamInterrupted {
            delivered_chars: delivered.chars().count(),
            reason: self.to_string(),
        }
    }

    /// Map a non-success HTTP status to its error
    pub fn from_status(status: u16, provider_message: Option<String>, retry_after_secs: Option<u64>) -> Self {
        let message = provider_message.unwrap_or_else(|| "Unknown error occurred".to_string());
        match status {
            400 => ClientError::BadRequest(message),
            401 => ClientError::Unauthorized,
            403 => ClientError::Forbidden,
            429 => ClientError::RateLimited { retry_after_secs },
            500..=599 => ClientError::ServerUnavailable { status },
            _ => ClientError::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(Duration::ZERO)
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
