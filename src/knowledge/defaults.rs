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

use crate::knowledge::types::{KnowledgeNode, NodeOption};

/// Built-in customer-support graph used when no knowledge file is configured
pub fn default_nodes() -> Vec<KnowledgeNode> {
    vec![
        KnowledgeNode::new(
            "welcome",
            &["hello", "hi", "hey"],
            "Welcome! How can I assist you today?",
            vec![
                NodeOption::new("Get Help", "help"),
                NodeOption::new("End Chat", "goodbye"),
            ],
        ),
        KnowledgeNode::new(
            "help",
            &["help", "support", "assist"],
            "Sure, I can help! What do you need assistance with?",
            vec![
                NodeOption::new("Product Information", "product"),
                NodeOption::new("Billing", "billing"),
                NodeOption::new("Technical Support", "tech_support"),
            ],
        ),
        KnowledgeNode::new(
            "product",
            &["product", "information"],
            "Our product is designed to make your life easier. Would you like to know more about its features or pricing?",
            vec![
                NodeOption::new("Features", "features"),
                NodeOption::new("Pricing", "pricing"),
            ],
        ),
        KnowledgeNode::new(
            "billing",
            &["billing", "payment", "invoice"],
            "For billing inquiries, please visit our billing portal or contact our finance department at billing@example.com.",
            vec![
                NodeOption::new("Back to Help", "help"),
                NodeOption::new("End Chat", "goodbye"),
            ],
        ),
        KnowledgeNode::new(
            "tech_support",
            &["technical", "support", "issue"],
            "For technical support, please describe your issue in detail and we'll do our best to assist you.",
            Vec::new(),
        ),
        KnowledgeNode::new(
            "features",
            &["features", "functionality"],
            "Our product offers cutting-edge features including AI-powered analytics, real-time collaboration, and seamless integration with popular tools.",
            vec![
                NodeOption::new("Back to Product Info", "product"),
                NodeOption::new("End Chat", "goodbye"),
            ],
        ),
        KnowledgeNode::new(
            "pricing",
            &["pricing", "cost", "plans"],
            "We offer flexible pricing plans starting at $9.99/month. For detailed pricing information, please visit our website or contact our sales team.",
            vec![
                NodeOption::new("Back to Product Info", "product"),
                NodeOption::new("End Chat", "goodbye"),
            ],
        ),
        KnowledgeNode::new(
            "goodbye",
            &["bye", "goodbye", "end"],
            "Thank you for chatting with us. Have a great day!",
            vec![NodeOption::new("Restart Chat", "welcome")],
        ),
    ]
}
