//! Saved document-wizard sessions.
//!
//! The wizard keeps snapshots of its sessions in the same key-value
//! namespace as the stores, one `session_<id>` document each. Entries come
//! from several writers, so reading is lenient: a document that does not
//! parse is skipped, missing fields take defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    load_json, save_json, Clock, KeyValueStore, StorageResult, Timestamps, SESSION_KEY_PREFIX,
};

/// Wizard session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sessions [`SessionStore::list`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionFilter {
    #[default]
    All,
    Status(SessionStatus),
}

impl SessionFilter {
    fn matches(self, session: &WizardSession) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => session.status == status,
        }
    }
}

/// One line of the wizard conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `system`
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Snapshot of a wizard session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardSession {
    pub session_id: String,
    pub name: String,
    pub document_type: String,
    /// 1-based wizard step
    pub current_phase: u32,
    pub chat_history: Vec<ChatMessage>,
    /// Notes per wizard step, e.g. `phase1`
    pub notes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Last save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub status: SessionStatus,
}

impl WizardSession {
    /// New in-progress session at the first step. The id is assigned on save.
    pub fn new(name: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document_type: document_type.into(),
            current_phase: 1,
            ..Self::default()
        }
    }
}

fn session_key(id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{id}")
}

/// Repository of wizard sessions over a [`KeyValueStore`].
#[derive(Debug)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    stamps: Timestamps,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, stamps: Timestamps::new(clock) }
    }

    /// Write `session`, refreshing its timestamp.
    ///
    /// A session without an id gets `session_<unix millis>`.
    pub fn save(&mut self, mut session: WizardSession) -> StorageResult<WizardSession> {
        let now = self.stamps.next();
        if session.session_id.is_empty() {
            session.session_id = format!("session_{}", now.timestamp_millis());
        }
        session.created.get_or_insert(now);
        session.timestamp = Some(now);

        save_json(self.storage.as_ref(), &session_key(&session.session_id), &session)?;
        tracing::debug!(id = %session.session_id, "saved wizard session");
        Ok(session)
    }

    /// Read one session.
    pub fn load(&self, id: &str) -> StorageResult<Option<WizardSession>> {
        load_json(self.storage.as_ref(), &session_key(id))
    }

    /// Remove a session. Returns false if there was none.
    pub fn delete(&self, id: &str) -> StorageResult<bool> {
        let key = session_key(id);
        if self.storage.get(&key)?.is_none() {
            return Ok(false);
        }
        self.storage.remove(&key)?;
        tracing::debug!(id, "deleted wizard session");
        Ok(true)
    }

    /// Mark a session completed.
    pub fn mark_completed(&mut self, id: &str) -> StorageResult<Option<WizardSession>> {
        let Some(mut session) = self.load(id)? else {
            return Ok(None);
        };
        session.status = SessionStatus::Completed;
        if session.session_id.is_empty() {
            session.session_id = id.to_string();
        }
        self.save(session).map(Some)
    }

    /// Every stored session matching `filter`, most recently saved first.
    pub fn list(&self, filter: SessionFilter) -> StorageResult<Vec<WizardSession>> {
        let mut sessions = Vec::new();
        for key in self.storage.keys()? {
            if !key.starts_with(SESSION_KEY_PREFIX) {
                continue;
            }
            match load_json::<WizardSession>(self.storage.as_ref(), &key) {
                Ok(Some(session)) if filter.matches(&session) => sessions.push(session),
                Ok(_) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping unreadable session"),
            }
        }

        // None sorts below Some, so undated sessions end up last
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(sessions)
    }
}
