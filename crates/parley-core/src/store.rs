//! Conversation persistence
//!
//! The store owns the in-memory conversation and a save directory of
//! `conversation_<YYYYMMDD_HHMMSS>.json` files, each a pretty-printed JSON
//! array of `{role, content}` objects.

use crate::error::{StoreError, StoreResult};
use crate::state::{Conversation, Message, Role};
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "conversation_";
const FILE_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of loading a saved conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub path: PathBuf,
    pub loaded: usize,
    /// Array indices of entries that were not `{role, content}` objects
    pub skipped: Vec<usize>,
}

impl LoadReport {
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// A saved conversation file as shown in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConversation {
    pub file_name: String,
    pub display_name: String,
}

impl SavedConversation {
    pub fn from_file_name(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let display_name = display_name(&file_name);
        Self {
            file_name,
            display_name,
        }
    }
}

pub struct ConversationStore {
    save_dir: PathBuf,
    conversation: Conversation,
}

impl ConversationStore {
    /// Open a store rooted at `save_dir`, creating the directory if needed
    pub fn open(save_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let save_dir = save_dir.into();
        fs::create_dir_all(&save_dir).map_err(|source| StoreError::CreateDir {
            path: save_dir.clone(),
            source,
        })?;
        debug!(dir = ?save_dir, "opened conversation store");

        Ok(Self {
            save_dir,
            conversation: Conversation::new(),
        })
    }

    /// Open a store in the platform data directory
    pub fn open_default() -> StoreResult<Self> {
        Self::open(default_save_dir())
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        self.conversation.push(Message::new(role, content))
    }

    /// Record a finished user/assistant turn
    pub fn commit_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.conversation.push(Message::user(user));
        self.conversation.push(Message::assistant(assistant));
    }

    /// Drop the in-memory conversation. Files on disk are untouched.
    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Write the conversation to `file_name`, or to a timestamped name when
    /// none is given. Returns the path written.
    pub fn save(&self, file_name: Option<&str>) -> StoreResult<PathBuf> {
        let file_name = match file_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => timestamped_file_name(),
        };
        let path = self.save_dir.join(&file_name);

        let contents = serde_json::to_string_pretty(&self.conversation)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &path)?;

        info!(path = ?path, messages = self.conversation.len(), "saved conversation");
        Ok(path)
    }

    /// Replace the in-memory conversation with the contents of `path`.
    ///
    /// The conversation is cleared first, so it stays empty when this
    /// returns an error. Entries that aren't objects with a known `role` and
    /// a string `content` are skipped and reported by index.
    pub fn load(&mut self, path: impl AsRef<Path>) -> StoreResult<LoadReport> {
        let path = path.as_ref();
        self.conversation.clear();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let value: Value = serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let Value::Array(entries) = value else {
            return Err(StoreError::Malformed {
                path: path.to_path_buf(),
                message: "expected a JSON array of messages".to_string(),
            });
        };

        let mut skipped = Vec::new();
        let mut messages = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(entry) {
                Some(message) => messages.push(message),
                None => skipped.push(index),
            }
        }

        if !skipped.is_empty() {
            warn!(path = ?path, skipped = ?skipped, "skipped malformed conversation entries");
        }

        self.conversation = Conversation::from(messages);
        info!(path = ?path, messages = self.conversation.len(), "loaded conversation");

        Ok(LoadReport {
            path: path.to_path_buf(),
            loaded: self.conversation.len(),
            skipped,
        })
    }

    /// File names of saved conversations, newest first. Empty when the
    /// save directory doesn't exist.
    pub fn list_saved(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.save_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            // Follows symlinks
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(FILE_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }

        // Timestamped names sort chronologically
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    pub fn saved_conversations(&self) -> StoreResult<Vec<SavedConversation>> {
        Ok(self
            .list_saved()?
            .into_iter()
            .map(SavedConversation::from_file_name)
            .collect())
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.save_dir.join(file_name)
    }
}

fn parse_entry(entry: &Value) -> Option<Message> {
    let object = entry.as_object()?;
    let role = object.get("role")?.as_str().and_then(Role::from_str)?;
    let content = object.get("content")?.as_str()?;
    Some(Message::new(role, content))
}

/// `<data_dir>/parley/conversations`, or `./conversations` when the
/// platform has no data directory
pub fn default_save_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("parley").join("conversations"))
        .unwrap_or_else(|| PathBuf::from("conversations"))
}

pub fn timestamped_file_name() -> String {
    format!(
        "{}{}{}",
        FILE_PREFIX,
        Local::now().format(TIMESTAMP_FORMAT),
        FILE_SUFFIX
    )
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^conversation_(\d{8}_\d{6})\.json$").expect("valid timestamp pattern")
    })
}

/// `conversation_20240131_142500.json` becomes `2024-01-31 14:25:00`;
/// anything else is shown as-is
pub fn display_name(file_name: &str) -> String {
    timestamp_pattern()
        .captures(file_name)
        .and_then(|caps| NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok())
        .map(|timestamp| timestamp.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| file_name.to_string())
}
