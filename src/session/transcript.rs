use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Model};

/// One finalized exchange; either side may be missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: Option<String>,
    pub bot: Option<String>,
}

impl Turn {
    /// History records for this turn, user side first
    pub fn into_messages(self, model: Model) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(text) = self.user {
            messages.push(ChatMessage::user(text));
        }
        if let Some(text) = self.bot {
            messages.push(ChatMessage::bot(text, model));
        }
        messages
    }
}

/// Assembles transcript fragments into turns
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    pending_user: String,
    pending_bot: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_input(&mut self, text: &str) {
        self.pending_user.push_str(text);
    }

    /// Append a bot fragment and return the running caption
    pub fn append_output(&mut self, text: &str) -> &str {
        self.pending_bot.push_str(text);
        &self.pending_bot
    }

    /// Cumulative bot text for the turn in progress
    pub fn caption(&self) -> &str {
        &self.pending_bot
    }

    pub fn finalize_turn(&mut self) -> Option<Turn> {
        let user = non_empty(self.pending_user.trim());
        let bot = non_empty(self.pending_bot.trim());

        self.pending_user.clear();
        self.pending_bot.clear();

        if user.is_none() && bot.is_none() {
            return None;
        }

        Some(Turn { user, bot })
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Sender;

    #[test]
    fn test_output_fragments_concatenate() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_output(" Hi");
        acc.append_output(" there,");
        let caption = acc.append_output(" friend ").to_string();
        assert_eq!(caption, " Hi there, friend ");

        let turn = acc.finalize_turn().unwrap();
        assert_eq!(turn.bot.as_deref(), Some("Hi there, friend"));
        assert_eq!(turn.user, None);
        assert_eq!(acc.caption(), "");
    }

    #[test]
    fn test_empty_finalize_emits_nothing() {
        let mut acc = TranscriptAccumulator::new();
        assert_eq!(acc.finalize_turn(), None);
    }

    #[test]
    fn test_whitespace_only_emits_nothing() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_input("  ");
        acc.append_output("\n");
        assert_eq!(acc.finalize_turn(), None);
        assert_eq!(acc.caption(), "");
    }

    #[test]
    fn test_buffers_reset_between_turns() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_input("first");
        acc.finalize_turn();
        acc.append_input("second");

        let turn = acc.finalize_turn().unwrap();
        assert_eq!(turn.user.as_deref(), Some("second"));
    }

    #[test]
    fn test_turn_into_messages_order() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_input("hello");
        acc.append_output("hi there");

        let messages = acc.finalize_turn().unwrap().into_messages(Model::Gemini);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].model, None);
        assert_eq!(messages[1].text, "hi there");
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].model, Some(Model::Gemini));
    }
}
