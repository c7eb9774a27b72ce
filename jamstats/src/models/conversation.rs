use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregation::AggregationResult;
use super::intent::{Entities, EntityRole, Intent, IntentKind};

/// A question as received. Not modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub session_id: String,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            received_at: Utc::now(),
        }
    }

    /// Whitespace-collapsed, lowercased text used for exact-text cache lookups.
    pub fn normalized_text(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: Query,
    pub intent: Intent,
    pub result: AggregationResult,
    pub answered_at: DateTime<Utc>,
}

/// What the resolver sees of one earlier turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub question: String,
    pub kind: IntentKind,
    pub entities: Entities,
}

/// Read-only view of a session's recent entities, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub turns: Vec<TurnSummary>,
}

impl ContextSummary {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Entities of the newest turn that carries `role`.
    pub fn latest_with(&self, role: EntityRole) -> Option<&Entities> {
        self.turns
            .iter()
            .rev()
            .map(|t| &t.entities)
            .find(|e| e.has(role))
    }
}
