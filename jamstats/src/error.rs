use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::api::v1::response::ApiResponse;
use crate::models::{EntityRole, SourceId};

#[derive(Error, Debug)]
pub enum JamError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("Data source {source_id} error: {message}")]
    Source { source_id: SourceId, message: String },

    #[error("Data source {source_id} rate limit exceeded, retry after {retry_after:?} seconds")]
    SourceRateLimit {
        source_id: SourceId,
        retry_after: Option<u64>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// The model answered, but not with parseable JSON.
    #[error("LLM returned malformed output: {0}")]
    LlmMalformed(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },
}

/// Handlers returning `Result<_, JamError>` answer in the v1 envelope.
impl IntoResponse for JamError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

impl JamError {
    /// Whether a data-source call that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            JamError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(true)
            }
            JamError::SourceRateLimit { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, JamError>;

/// The understanding service's output could not be turned into a valid intent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionFailure {
    #[error("unknown intent kind '{0}'")]
    UnknownIntent(String),

    #[error("could not resolve {role} '{value}': {detail}")]
    UnresolvableEntity {
        role: EntityRole,
        value: String,
        detail: String,
    },

    #[error("confidence {confidence:.2} is below the threshold {threshold:.2}")]
    LowConfidence { confidence: f32, threshold: f32 },

    #[error("understanding service returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("understanding service timed out")]
    Timeout,

    #[error("understanding service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ResolutionFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownIntent(_) => "unknown_intent",
            Self::UnresolvableEntity { .. } => "unresolvable_entity",
            Self::LowConfidence { .. } => "low_confidence",
            Self::MalformedOutput(_) => "malformed_output",
            Self::Timeout => "timeout",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningFailure {
    #[error("no data source covers {0}")]
    NoSourceCoversIntent(String),

    #[error("question is missing a {0}")]
    MissingEntity(EntityRole),
}

impl PlanningFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSourceCoversIntent(_) => "no_source_covers_intent",
            Self::MissingEntity(_) => "missing_entity",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationFailure {
    #[error("all required data-source calls failed: {0}")]
    AllRequiredCallsFailed(String),

    #[error("required data-source call {label} failed: {detail}")]
    RequiredCallFailed { label: String, detail: String },

    #[error("no records matched the question")]
    NoMatchingRecords,
}

impl AggregationFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllRequiredCallsFailed(_) => "all_required_calls_failed",
            Self::RequiredCallFailed { .. } => "required_call_failed",
            Self::NoMatchingRecords => "no_matching_records",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisFailure {
    #[error("response template references '{{{0}}}' but no such field was produced")]
    TemplateFieldMissing(String),
}

impl SynthesisFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateFieldMissing(_) => "template_field_missing",
        }
    }
}

/// Terminal outcome of a query that did not produce an answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error(transparent)]
    Planning(#[from] PlanningFailure),

    #[error(transparent)]
    Aggregation(#[from] AggregationFailure),

    #[error(transparent)]
    Synthesis(#[from] SynthesisFailure),

    #[error("session ended before the answer was ready")]
    Cancelled,
}

/// Wire shape of a failure for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureView {
    /// `resolution`, `planning`, `aggregation`, `synthesis` or `cancelled`.
    pub stage: String,
    /// Stable snake_case reason code, e.g. `malformed_output`.
    pub reason: String,
    /// Text safe to show to the user.
    pub message: String,
}

impl QueryFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Planning(_) => "planning",
            Self::Aggregation(_) => "aggregation",
            Self::Synthesis(_) => "synthesis",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolution(f) => f.code(),
            Self::Planning(f) => f.code(),
            Self::Aggregation(f) => f.code(),
            Self::Synthesis(f) => f.code(),
            Self::Cancelled => "cancelled",
        }
    }

    /// Clarification prompt for resolution/planning failures, an apology for
    /// data failures. Never contains internal error detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolution(ResolutionFailure::UnresolvableEntity { role, value, .. }) => {
                format!(
                    "I couldn't tell which {role} you meant by \"{value}\". Could you spell it out or pick a more specific name?"
                )
            }
            Self::Resolution(ResolutionFailure::LowConfidence { .. }) => {
                "I'm not sure I understood that. Could you rephrase, e.g. \"What's the longest Tweezer ever?\"".to_string()
            }
            Self::Resolution(ResolutionFailure::UnknownIntent(_)) => {
                "I can answer questions about setlists, song lengths, gaps, venues and jam highlights. Could you rephrase your question along those lines?".to_string()
            }
            Self::Resolution(
                ResolutionFailure::MalformedOutput(_)
                | ResolutionFailure::Timeout
                | ResolutionFailure::ServiceUnavailable(_),
            ) => "I couldn't work out what you're asking. Could you rephrase the question?"
                .to_string(),
            Self::Planning(PlanningFailure::MissingEntity(role)) => {
                format!("Which {role} do you mean? Add it to the question and I'll look it up.")
            }
            Self::Planning(PlanningFailure::NoSourceCoversIntent(_)) => {
                "I don't have data that can answer that yet. Try asking about song lengths, play counts, gaps or venues.".to_string()
            }
            Self::Aggregation(_) | Self::Synthesis(_) => {
                "Sorry, the data for that isn't available right now.".to_string()
            }
            Self::Cancelled => "This conversation was closed before the answer was ready.".to_string(),
        }
    }

    pub fn view(&self) -> FailureView {
        FailureView {
            stage: self.stage().to_string(),
            reason: self.code().to_string(),
            message: self.user_message(),
        }
    }
}
