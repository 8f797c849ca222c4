//! Chat domain: models, messages and per-model histories

pub mod gemini;
pub mod history;
pub mod models;
pub mod service;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

pub use gemini::{GeminiClient, GenerativeClient};
pub use history::HistoryStore;
pub use models::{ModelResponse, ModelRouter};
pub use service::ChatService;

/// Selectable chat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "Gemini Flash")]
    Gemini,
    #[serde(rename = "InsanityV1")]
    InsanityV1,
    #[serde(rename = "NexziIvision1o")]
    NexziIvision1o,
    #[serde(rename = "CoreNexzi")]
    CoreNexzi,
}

impl Model {
    pub const ALL: [Model; 4] = [
        Model::Gemini,
        Model::InsanityV1,
        Model::NexziIvision1o,
        Model::CoreNexzi,
    ];

    /// Display name, also the history key
    pub fn label(self) -> &'static str {
        match self {
            Model::Gemini => "Gemini Flash",
            Model::InsanityV1 => "InsanityV1",
            Model::NexziIvision1o => "NexziIvision1o",
            Model::CoreNexzi => "CoreNexzi",
        }
    }

    /// URL and command-line identifier
    pub fn slug(self) -> &'static str {
        match self {
            Model::Gemini => "gemini",
            Model::InsanityV1 => "insanity-v1",
            Model::NexziIvision1o => "nexzi-ivision-1o",
            Model::CoreNexzi => "core-nexzi",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Model {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(s) || m.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown model: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Web source cited by a grounded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// A proposed research plan awaiting execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub original_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_executed: Option<bool>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            text: text.into(),
            sender: Sender::User,
            model: None,
            is_error: false,
            sources: None,
            plan: None,
            plan_executed: None,
        }
    }

    pub fn bot(text: impl Into<String>, model: Model) -> Self {
        Self {
            sender: Sender::Bot,
            model: Some(model),
            ..Self::user(text)
        }
    }

    pub fn error(text: impl Into<String>, model: Model) -> Self {
        Self {
            is_error: true,
            ..Self::bot(text, model)
        }
    }
}

/// Ordered message list per model
pub type ChatHistories = BTreeMap<Model, Vec<ChatMessage>>;

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp with a per-process sequence in the low digits
pub fn next_message_id() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    millis * 1000 + seq
}
