use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A server-held multi-turn conversation. History grows by exactly one
/// user/model pair per reply cycle and is never truncated.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: String,
    pub history: Vec<Turn>,
    pub created_ms: u64,
    pub last_used_ms: u64,
    pub working_directory: Option<String>,
}

/// In-memory session registry with idle-time eviction. The clock is
/// injected: every operation takes `now_ms`, so eviction is deterministic
/// under test without real time passing.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, ConversationSession>,
    counter: u64,
    retention_ms: u64,
}

pub const DEFAULT_RETENTION_MS: u64 = 3_600_000;

impl SessionStore {
    pub fn new(retention_ms: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            counter: 1,
            retention_ms,
        }
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_ms
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Allocates a fresh id and inserts a new session. The counter suffix is
    /// process-monotone, so ids never collide within a process.
    pub fn create(
        &mut self,
        now_ms: u64,
        history: Vec<Turn>,
        working_directory: Option<String>,
    ) -> String {
        let id = format!("conv-{}-{}", now_ms, self.counter);
        self.counter = self.counter.saturating_add(1);
        self.sessions.insert(
            id.clone(),
            ConversationSession {
                id: id.clone(),
                history,
                created_ms: now_ms,
                last_used_ms: now_ms,
                working_directory,
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<&ConversationSession> {
        self.sessions.get(id)
    }

    /// Appends one completed user/model exchange and refreshes the idle
    /// clock. Returns `None` when the id is unknown; the session is never
    /// observable with only half of the pair appended.
    pub fn append_turn(
        &mut self,
        id: &str,
        user_text: impl Into<String>,
        model_text: impl Into<String>,
        now_ms: u64,
    ) -> Option<&ConversationSession> {
        let session = self.sessions.get_mut(id)?;
        session.history.push(Turn::user(user_text));
        session.history.push(Turn::model(model_text));
        session.last_used_ms = now_ms;
        Some(session)
    }

    /// Removes every session idle for longer than the retention window.
    /// Returns the number of evicted sessions.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let retention = self.retention_ms;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now_ms.saturating_sub(s.last_used_ms) <= retention);
        before.saturating_sub(self.sessions.len())
    }
}
