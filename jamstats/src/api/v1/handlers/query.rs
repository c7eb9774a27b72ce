//! v1 question answering.
//!
//! A question the pipeline cannot answer is still a 200: the envelope's
//! `data` carries `success: false` and the failure view. Transport-level
//! errors are reserved for malformed requests.

use axum::extract::State;

use crate::api::extractors::AppJson;
use crate::api::v1::dto::{QueryRequest, QueryResponse, SuggestionsResponse};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::models::Query;

const MAX_QUESTION_CHARS: usize = 500;

const STARTER_QUESTIONS: &[&str] = &[
    "What's the longest Tweezer ever?",
    "What's the average Ghost length?",
    "How many times has Reba been played?",
    "What's the gap on Fluffhead?",
    "What songs have never been played at Madison Square Garden?",
    "What opened the show on Dec 31, 1995?",
    "How many 20+ minute Down with Disease jams are there?",
];

/// `POST /api/v1/query`
#[utoipa::path(
    post,
    path = "/api/v1/query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Answer, or a clarification when the question could not be answered", body = QueryResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    )
)]
pub async fn answer_question(
    State(state): State<AppState>,
    AppJson(req): AppJson<QueryRequest>,
) -> ApiResponse<QueryResponse> {
    let question = req.question.trim();
    if question.is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Question cannot be empty");
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return ApiResponse::error(
            ErrorCode::InvalidRequest,
            format!("Question is longer than {MAX_QUESTION_CHARS} characters"),
        );
    }

    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| nanoid::nanoid!());

    let query = Query::new(question, session_id.clone());
    match state.pipeline.answer(&query).await {
        Ok(answer) => ApiResponse::success(QueryResponse::answered(session_id, answer)),
        Err(failure) => ApiResponse::success(QueryResponse::failed(session_id, &failure)),
    }
}

/// `GET /api/v1/suggestions`
#[utoipa::path(
    get,
    path = "/api/v1/suggestions",
    tag = "query",
    responses(
        (status = 200, description = "Starter questions", body = SuggestionsResponse),
    )
)]
pub async fn suggestions() -> ApiResponse<SuggestionsResponse> {
    ApiResponse::success(SuggestionsResponse {
        questions: STARTER_QUESTIONS.iter().map(|q| q.to_string()).collect(),
    })
}
