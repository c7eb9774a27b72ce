//! Per-session bounded history of answered turns.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use tokio_util::sync::CancellationToken;

use crate::models::{ContextSummary, ConversationTurn, TurnSummary};

struct SessionLog {
    turns: VecDeque<ConversationTurn>,
    /// Cancelled when the session is torn down.
    cancel: CancellationToken,
}

impl SessionLog {
    fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Conversation history keyed by session id, holding at most `max_sessions`
/// sessions; the least recently used one is forgotten first. Locks are never
/// held across an await.
#[derive(Clone)]
pub struct ConversationStore {
    sessions: Arc<Mutex<LruCache<String, SessionLog>>>,
    window: usize,
}

impl ConversationStore {
    pub fn new(window: usize, max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Arc::new(Mutex::new(LruCache::new(capacity))),
            window: window.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, SessionLog>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Token cancelled when `session_id` ends. Creates the session if needed,
    /// forgetting the least recently used one when the store is full.
    pub fn session_token(&self, session_id: &str) -> CancellationToken {
        let mut sessions = self.lock();
        if let Some(log) = sessions.get(session_id) {
            return log.cancel.clone();
        }
        let log = SessionLog::new();
        let token = log.cancel.clone();
        // An evicted session's in-flight work still finishes; its turn is dropped on append.
        if let Some((evicted, old)) = sessions.push(session_id.to_string(), log) {
            tracing::debug!(
                session_id = %evicted,
                turns = old.turns.len(),
                "Forgot least recently used session"
            );
        }
        token
    }

    /// Append an answered turn, evicting the oldest beyond the window.
    /// Turns for a session that has ended are discarded.
    pub fn append(&self, turn: ConversationTurn) {
        let mut sessions = self.lock();
        let Some(log) = sessions.get_mut(&turn.query.session_id) else {
            tracing::debug!(session_id = %turn.query.session_id, "Dropping turn for ended session");
            return;
        };
        if log.cancel.is_cancelled() {
            return;
        }
        log.turns.push_back(turn);
        while log.turns.len() > self.window {
            log.turns.pop_front();
        }
    }

    /// Up to `limit` most recent turns, oldest first.
    pub fn recent(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        self.lock()
            .peek(session_id)
            .map(|log| {
                let skip = log.turns.len().saturating_sub(limit);
                log.turns.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// What the resolver sees of the last `limit` turns.
    pub fn summary(&self, session_id: &str, limit: usize) -> ContextSummary {
        ContextSummary {
            turns: self
                .recent(session_id, limit)
                .into_iter()
                .map(|turn| TurnSummary {
                    question: turn.query.text,
                    kind: turn.intent.kind,
                    entities: turn.intent.entities,
                })
                .collect(),
        }
    }

    /// Tear the session down: cancel in-flight work and drop its history.
    /// Returns whether the session existed.
    pub fn end_session(&self, session_id: &str) -> bool {
        match self.lock().pop(session_id) {
            Some(log) => {
                log.cancel.cancel();
                tracing::info!(session_id, turns = log.turns.len(), "Ended session");
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}
