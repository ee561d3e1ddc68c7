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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    pub retry_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    pub fn new(retry_attempts: u32, base_delay: Duration) -> Self {
        Self {
            retry_attempts,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base_delay * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }
}
