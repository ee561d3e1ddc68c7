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

#[cfg(test)]
mod tests {
    use super::super::window::{estimate_tokens, ChatMessage, ContextWindow, Role};

    fn pairs(window: &ContextWindow) -> Vec<(Role, String)> {
        window
            .get_context(false)
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect()
    }

    fn assert_invariants(window: &ContextWindow) {
        assert!(window.len() <= window.max_messages());
        assert!(window.total_token_estimate() <= window.max_tokens() || window.len() <= 2);
        let sum: usize = window.messages().map(|m| m.token_estimate).sum();
        assert_eq!(sum, window.total_token_estimate());
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_add_message_tracks_tokens() {
        let mut window = ContextWindow::default();
        window.add_message(Role::User, "hello there");
        window.add_message(Role::Assistant, "hi");

        assert_eq!(window.len(), 2);
        assert_eq!(window.total_token_estimate(), 3 + 1);
        assert_invariants(&window);
    }

    #[test]
    fn test_empty_content_is_ignored() {
        let mut window = ContextWindow::default();
        window.add_message(Role::User, "");
        assert!(window.is_empty());
        assert_eq!(window.total_token_estimate(), 0);
    }

    #[test]
    fn test_message_limit_evicts_oldest() {
        let mut window = ContextWindow::new("sys", 3, 10_000);
        for i in 0..5 {
            window.add_message(Role::User, &format!("message {}", i));
            assert_invariants(&window);
        }

        let contents: Vec<String> = pairs(&window).into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_token_limit_keeps_last_exchange() {
        let mut window = ContextWindow::new("sys", 10, 10);
        let long = "x".repeat(100);

        window.add_message(Role::User, &long);
        window.add_message(Role::Assistant, &long);
        assert_eq!(window.len(), 2);

        window.add_message(Role::User, &long);
        assert_eq!(window.len(), 2);
        assert_eq!(window.total_token_estimate(), 50);
        assert_invariants(&window);
    }

    #[test]
    fn test_token_limit_trims_until_within_budget() {
        let mut window = ContextWindow::new("sys", 10, 30);
        for _ in 0..6 {
            window.add_message(Role::User, &"y".repeat(40));
            assert_invariants(&window);
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.total_token_estimate(), 30);
    }

    #[test]
    fn test_get_context_prepends_system_prompt() {
        let mut window = ContextWindow::new("Be brief.", 10, 2000);
        window.add_message(Role::User, "hi");

        let with_system = window.get_context(true);
        assert_eq!(with_system[0], ChatMessage::new(Role::System, "Be brief."));
        assert_eq!(with_system[1], ChatMessage::new(Role::User, "hi"));

        let without = window.get_context(false);
        assert_eq!(without, vec![ChatMessage::new(Role::User, "hi")]);

        // Reading never mutates the window
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_empty_system_prompt_is_not_sent() {
        let mut window = ContextWindow::new("", 10, 2000);
        window.add_message(Role::User, "hi");
        assert_eq!(window.get_context(true).len(), 1);
    }

    #[test]
    fn test_clear_keeps_system_prompt() {
        let mut window = ContextWindow::new("Keep me", 10, 2000);
        window.add_message(Role::User, "hi");
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.total_token_estimate(), 0);
        assert_eq!(window.get_context(true), vec![ChatMessage::new(Role::System, "Keep me")]);
    }

    #[test]
    fn test_export_import_preserves_order() {
        let mut window = ContextWindow::new("Prompt", 6, 2000);
        window.add_message(Role::User, "first");
        window.add_message(Role::Assistant, "second");
        window.add_message(Role::User, "third");

        let json = serde_json::to_string(&window.export()).unwrap();

        let mut restored = ContextWindow::default();
        let outcome = restored.import_json(&json);

        assert!(outcome.success);
        assert_eq!(outcome.message_count, 3);
        assert_eq!(pairs(&restored), pairs(&window));
        assert_eq!(restored.system_prompt(), "Prompt");
        assert_eq!(restored.max_messages(), 6);
        assert_invariants(&restored);
    }

    #[test]
    fn test_import_drops_oldest_beyond_limit() {
        let json = r#"{
            "systemPrompt": "s",
            "maxMessages": 2,
            "maxTokens": 1000,
            "messages": [
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": "two"},
                {"role": "user", "content": "three"}
            ]
        }"#;

        let mut window = ContextWindow::default();
        let outcome = window.import_json(json);

        assert!(outcome.success);
        let contents: Vec<String> = pairs(&window).into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[test]
    fn test_import_accepts_legacy_key() {
        let json = r#"{
            "version": "1.0",
            "contextWindow": [{"role": "user", "content": "legacy", "timestamp": "2025-01-01T00:00:00Z"}]
        }"#;

        let mut window = ContextWindow::default();
        assert!(window.import_json(json).success);
        assert_eq!(window.len(), 1);
        assert_eq!(window.max_messages(), 10);
    }

    #[test]
    fn test_invalid_import_reports_failure_without_mutation() {
        let mut window = ContextWindow::default();
        window.add_message(Role::User, "keep");

        let outcome = window.import_json(r#"{"messages": "nope"}"#);
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(window.len(), 1);

        let outcome = window.import_json(r#"{"messages": [{"role": "robot", "content": "x"}]}"#);
        assert!(!outcome.success);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_last_messages() {
        let mut window = ContextWindow::default();
        for i in 0..4 {
            window.add_message(Role::User, &i.to_string());
        }

        let last: Vec<&str> = window
            .last_messages(2)
            .into_iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(last, vec!["2", "3"]);
        assert_eq!(window.last_messages(10).len(), 4);
    }

    #[test]
    fn test_stats_preview() {
        let prompt = "p".repeat(80);
        let mut window = ContextWindow::new(prompt, 5, 100);
        window.add_message(Role::User, "abcd");

        let stats = window.stats();
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.estimated_tokens, 1);
        assert_eq!(stats.system_prompt, Some(format!("{}...", "p".repeat(50))));
    }

    #[test]
    fn test_summarize_older_half() {
        let mut window = ContextWindow::default();
        assert_eq!(window.summarize(), "");

        window.add_message(Role::User, "question one");
        window.add_message(Role::Assistant, &"a".repeat(120));
        window.add_message(Role::User, "question two");
        window.add_message(Role::Assistant, "answer two");

        let summary = window.summarize();
        let expected = format!(
            "Previous conversation summary:\nuser: question one\nassistant: {}...",
            "a".repeat(100)
        );
        assert_eq!(summary, expected);
    }
}
