use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{error, info, warn};

use super::{ChatHistories, ChatMessage, Model};

/// Per-model chat histories persisted as one JSON document
///
/// Loading never fails: a missing or unreadable file yields empty histories.
/// Write failures are logged and the in-memory state stays authoritative.
pub struct HistoryStore {
    path: Option<PathBuf>,
    histories: RwLock<ChatHistories>,
}

impl HistoryStore {
    /// Histories that live only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            histories: RwLock::new(ChatHistories::new()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let histories = match read_histories(&path) {
            Ok(Some(histories)) => {
                info!(
                    "Loaded chat histories from {} ({} models)",
                    path.display(),
                    histories.len()
                );
                histories
            }
            Ok(None) => ChatHistories::new(),
            Err(e) => {
                error!("Failed to load chat histories, starting empty: {:#}", e);
                ChatHistories::new()
            }
        };

        Self {
            path: Some(path),
            histories: RwLock::new(histories),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn history(&self, model: Model) -> Vec<ChatMessage> {
        self.histories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model)
            .cloned()
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> ChatHistories {
        self.histories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn append(&self, model: Model, messages: Vec<ChatMessage>) {
        if messages.is_empty() {
            return;
        }
        self.modify(|histories| {
            histories.entry(model).or_default().extend(messages);
        });
    }

    /// Start a new chat for `model`
    pub fn clear(&self, model: Model) {
        self.modify(|histories| {
            histories.insert(model, Vec::new());
        });
    }

    /// Apply `f` to one message; returns whatever `f` returned, or `None`
    /// when the message does not exist
    pub fn update_message<T>(
        &self,
        model: Model,
        id: u64,
        f: impl FnOnce(&mut ChatMessage) -> T,
    ) -> Option<T> {
        let mut result = None;
        self.modify(|histories| {
            if let Some(message) = histories
                .get_mut(&model)
                .and_then(|messages| messages.iter_mut().find(|m| m.id == id))
            {
                result = Some(f(message));
            }
        });
        result
    }

    fn modify(&self, f: impl FnOnce(&mut ChatHistories)) {
        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut histories);

        if let Some(path) = &self.path {
            if let Err(e) = write_histories(path, &histories) {
                error!("Failed to save chat histories: {:#}", e);
            }
        }
    }
}

fn read_histories(path: &Path) -> Result<Option<ChatHistories>> {
    if !path.exists() {
        warn!("No chat history at {}, starting empty", path.display());
        return Ok(None);
    }

    let raw = fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let histories = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(histories))
}

fn write_histories(path: &Path, histories: &ChatHistories) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .context("Failed to create history directory")?;
    }

    let json = serde_json::to_vec_pretty(histories)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
