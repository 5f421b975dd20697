//! Session registry
//!
//! In-memory map of session id to goal, history, and timestamps. Sessions
//! are created on first reference, mutated only through whole-record
//! operations here, and die with the process.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::HistoryEntry;

/// A named conversation context
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    pub goal: String,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Session {
            id,
            created_at: now,
            last_activity_at: now,
            history: Vec::new(),
            goal: String::new(),
        }
    }
}

/// Summary row for session listings
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub history_len: usize,
    pub goal: String,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        SessionInfo {
            id: session.id.clone(),
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            history_len: session.history.len(),
            goal: session.goal.clone(),
        }
    }
}

/// Owner of every session record
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id, creating the session on first reference. A requested
    /// id is honored; otherwise a fresh uuid is assigned.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> String {
        let mut sessions = self.sessions.write().await;
        match session_id {
            Some(id) if sessions.contains_key(id) => id.to_string(),
            Some(id) => {
                sessions.insert(id.to_string(), Session::new(id.to_string()));
                id.to_string()
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sessions.insert(id.clone(), Session::new(id.clone()));
                id
            }
        }
    }

    /// Whole-record read
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Stamp activity on a session
    pub async fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.last_activity_at = Utc::now();
        }
    }

    /// Take a session's history and goal out for a loop run. The caller
    /// gives them back through [`SessionRegistry::store_history`].
    pub async fn take_history(&self, session_id: &str) -> (Vec<HistoryEntry>, String) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => (std::mem::take(&mut session.history), session.goal.clone()),
            None => (Vec::new(), String::new()),
        }
    }

    /// Write a session's history and goal back after a loop run
    pub async fn store_history(&self, session_id: &str, history: Vec<HistoryEntry>, goal: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.history = history;
            session.goal = goal.to_string();
            session.last_activity_at = Utc::now();
        }
    }

    /// Append one entry to a session's history
    pub async fn append_entry(&self, session_id: &str, entry: HistoryEntry) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.history.push(entry);
            session.last_activity_at = Utc::now();
        }
    }

    /// Empty a session's history in place
    pub async fn clear_history(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.history.clear();
                session.last_activity_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Destroy a session
    pub async fn delete(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Summary rows for every live session
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut rows: Vec<SessionInfo> = sessions.values().map(SessionInfo::from).collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
