
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::embeddings::chunking::ChunkMetadata;

/// Settings key holding a user's web search preference
pub const WEB_SEARCH_SETTING: &str = "web_search";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Wall clock time, `HH:MM:SS`
    pub timestamp: String,
    /// Citations attached to an assistant answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<ChunkMetadata>>,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: timestamp(),
            metadata: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>, citations: Vec<ChunkMetadata>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: timestamp(),
            metadata: Some(citations),
        }
    }
}

#[inline]
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Everything stored for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub sessions: BTreeMap<String, Vec<ChatMessage>>,
    /// Fields written by older versions, kept as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for UserRecord {
    #[inline]
    fn default() -> Self {
        Self {
            created_at: Local::now().to_rfc3339(),
            settings: BTreeMap::new(),
            sessions: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl UserRecord {
    #[inline]
    pub fn web_search(&self) -> Option<bool> {
        self.settings.get(WEB_SEARCH_SETTING).and_then(Value::as_bool)
    }

    #[inline]
    pub fn set_web_search(&mut self, enabled: bool) {
        self.settings
            .insert(WEB_SEARCH_SETTING.to_string(), Value::Bool(enabled));
    }
}

/// JSON file mapping user names to their records
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
    users: BTreeMap<String, UserRecord>,
}

impl UserStore {
    /// Read the store at `path`; a missing file is an empty store
    #[inline]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let users = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read user store: {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse user store: {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        debug!("Loaded {} users from {}", users.len(), path.display());
        Ok(Self { path, users })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store through a temporary file so a crash never leaves half a file
    #[inline]
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(&self.users).context("Failed to serialize user store")?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved {} users to {}", self.users.len(), self.path.display());
        Ok(())
    }

    #[inline]
    pub fn user(&self, name: &str) -> Option<&UserRecord> {
        self.users.get(name)
    }

    #[inline]
    pub fn ensure_user(&mut self, name: &str) -> &mut UserRecord {
        self.users.entry(name.to_string()).or_default()
    }

    #[inline]
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}
