//! Conversation history for a chat session
//!
//! History lives in memory only. It always starts with a seeded assistant
//! greeting and grows one turn at a time; `reset` brings it back to the
//! greeting alone.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Greeting that opens every session
pub const GREETING: &str = "How can I help you?";

/// Default number of recent turns handed to the model
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl From<Role> for dbbot_provider::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::User => dbbot_provider::Role::User,
            Role::Assistant => dbbot_provider::Role::Assistant,
        }
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }
}

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    greeting: String,
    turns: Vec<Turn>,
    /// Created at timestamp
    pub created_at: DateTime<Local>,
    /// Last updated timestamp
    pub updated_at: DateTime<Local>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(GREETING)
    }
}

impl Session {
    /// Create a session seeded with `greeting`
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let now = Local::now();
        Self {
            turns: vec![Turn::new(Role::Assistant, greeting.clone())],
            greeting,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
        self.updated_at = Local::now();
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Drop everything but a fresh greeting
    pub fn reset(&mut self) {
        self.turns = vec![Turn::new(Role::Assistant, self.greeting.clone())];
        self.updated_at = Local::now();
        debug!("session reset");
    }

    /// The most recent `max_turns` turns as model messages
    pub fn history(&self, max_turns: usize) -> Vec<dbbot_provider::Message> {
        self.turns
            .iter()
            .skip(self.turns.len().saturating_sub(max_turns))
            .map(|t| dbbot_provider::Message::new(t.role.into(), t.content.clone()))
            .collect()
    }

    /// History up to, but not including, the newest turn
    pub fn history_before_last(&self, max_turns: usize) -> Vec<dbbot_provider::Message> {
        let end = self.turns.len().saturating_sub(1);
        self.turns[..end]
            .iter()
            .skip(end.saturating_sub(max_turns))
            .map(|t| dbbot_provider::Message::new(t.role.into(), t.content.clone()))
            .collect()
    }
}
