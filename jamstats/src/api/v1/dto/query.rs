//! Query request/response DTOs for the v1 API.

use serde::{Deserialize, Serialize};

use crate::error::{FailureView, QueryFailure};
use crate::models::{Answer, Card};

/// Request body for `POST /v1/query`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// The question, in plain English.
    pub question: String,
    /// Conversation to continue. A new one is started when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response for `POST /v1/query`.
///
/// Unanswerable questions are not transport errors: they come back with
/// `success: false` and a `failure` explaining what to change.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub session_id: String,
    pub success: bool,
    /// Answer text, or the clarification prompt when `success` is false.
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    pub related: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureView>,
}

impl QueryResponse {
    pub fn answered(session_id: String, answer: Answer) -> Self {
        Self {
            session_id,
            success: true,
            answer: answer.answer,
            highlight: answer.highlight,
            card: Some(answer.card),
            related: answer.related,
            warnings: answer.warnings,
            failure: None,
        }
    }

    pub fn failed(session_id: String, failure: &QueryFailure) -> Self {
        let view = failure.view();
        Self {
            session_id,
            success: false,
            answer: view.message.clone(),
            highlight: None,
            card: None,
            related: Vec::new(),
            warnings: Vec::new(),
            failure: Some(view),
        }
    }
}

/// Response for `GET /v1/suggestions`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsResponse {
    pub questions: Vec<String>,
}
