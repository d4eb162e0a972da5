
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

use super::store::{ChatMessage, UserStore};

pub const FIRST_SESSION: &str = "Chat 1";

/// The chat sessions of whoever is talking, and which one is active.
///
/// A guest conversation lives only in memory; a named one is written back to the
/// user store by [`Conversation::save_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    owner: Option<String>,
    sessions: BTreeMap<String, Vec<ChatMessage>>,
    current: String,
    web_search: bool,
}

impl Conversation {
    #[inline]
    pub fn guest(web_search: bool) -> Self {
        Self {
            owner: None,
            sessions: BTreeMap::from([(FIRST_SESSION.to_string(), Vec::new())]),
            current: FIRST_SESSION.to_string(),
            web_search,
        }
    }

    /// Open `username`'s sessions, creating the user when needed.
    ///
    /// `default_web_search` applies when the user never chose a setting.
    #[inline]
    pub fn for_user(store: &mut UserStore, username: &str, default_web_search: bool) -> Self {
        let record = store.ensure_user(username);

        let mut sessions = record.sessions.clone();
        if sessions.is_empty() {
            sessions.insert(FIRST_SESSION.to_string(), Vec::new());
        }
        let current = sessions
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| FIRST_SESSION.to_string());

        Self {
            owner: Some(username.to_string()),
            sessions,
            current,
            web_search: record.web_search().unwrap_or(default_web_search),
        }
    }

    #[inline]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    #[inline]
    pub fn is_guest(&self) -> bool {
        self.owner.is_none()
    }

    #[inline]
    pub fn current_session(&self) -> &str {
        &self.current
    }

    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        self.sessions
            .get(&self.current)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Session names with their message counts
    #[inline]
    pub fn sessions(&self) -> Vec<(&str, usize)> {
        self.sessions
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.len()))
            .collect()
    }

    /// Switch to `name`, starting it empty if it does not exist
    #[inline]
    pub fn select(&mut self, name: &str) {
        self.sessions.entry(name.to_string()).or_default();
        self.current = name.to_string();
    }

    /// Start `Chat <n+1>` and make it current
    #[inline]
    pub fn new_chat(&mut self) -> &str {
        let mut index = self.sessions.len() + 1;
        let mut name = format!("Chat {}", index);
        while self.sessions.contains_key(&name) {
            index += 1;
            name = format!("Chat {}", index);
        }

        debug!("Starting new chat session {}", name);
        self.sessions.insert(name.clone(), Vec::new());
        self.current = name;
        &self.current
    }

    #[inline]
    pub fn clear(&mut self) {
        self.sessions.insert(self.current.clone(), Vec::new());
    }

    #[inline]
    pub fn push(&mut self, message: ChatMessage) {
        self.sessions
            .entry(self.current.clone())
            .or_default()
            .push(message);
    }

    #[inline]
    pub fn web_search(&self) -> bool {
        self.web_search
    }

    #[inline]
    pub fn set_web_search(&mut self, enabled: bool) {
        self.web_search = enabled;
    }

    /// Copy the sessions and settings into the store and save it. Guests are not saved.
    #[inline]
    pub fn save_to(&self, store: &mut UserStore) -> Result<()> {
        let Some(owner) = &self.owner else {
            return Ok(());
        };

        let record = store.ensure_user(owner);
        record.sessions = self.sessions.clone();
        record.set_web_search(self.web_search);
        store.save()
    }
}
