//! Where finalized turns go
//!
//! Talk mode records each turn as soon as it completes; live mode buffers the
//! conversation of the current session and records it when the session is
//! exited. Turns left over from an earlier session are dropped on start.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use super::transcript::Turn;
use crate::chat::{HistoryStore, Model};

/// Receives turns from a voice session
pub trait TurnSink: Send + Sync {
    /// Called each time a new session starts
    fn on_start(&self) {}

    fn on_turn(&self, turn: Turn);

    /// Called once when the user leaves the voice session
    fn on_exit(&self) {}
}

/// Appends every turn to the history as soon as it is finalized
pub struct PerTurnCommit {
    store: Arc<HistoryStore>,
    model: Model,
}

impl PerTurnCommit {
    pub fn new(store: Arc<HistoryStore>, model: Model) -> Self {
        Self { store, model }
    }
}

impl TurnSink for PerTurnCommit {
    fn on_turn(&self, turn: Turn) {
        self.store.append(self.model, turn.into_messages(self.model));
    }
}

/// Buffers turns and appends them all when the session is exited
pub struct DeferredCommit {
    store: Arc<HistoryStore>,
    model: Model,
    turns: Mutex<Vec<Turn>>,
}

impl DeferredCommit {
    pub fn new(store: Arc<HistoryStore>, model: Model) -> Self {
        Self {
            store,
            model,
            turns: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl TurnSink for DeferredCommit {
    fn on_start(&self) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn on_turn(&self, turn: Turn) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(turn);
    }

    fn on_exit(&self) {
        let turns = std::mem::take(&mut *self.turns.lock().unwrap_or_else(PoisonError::into_inner));
        if turns.is_empty() {
            return;
        }

        info!("Saving {} live turns to {}", turns.len(), self.model);
        let messages = turns
            .into_iter()
            .flat_map(|turn| turn.into_messages(self.model))
            .collect();
        self.store.append(self.model, messages);
    }
}
