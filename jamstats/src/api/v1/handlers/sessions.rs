use axum::extract::{Path, State};

use crate::api::v1::dto::EndSessionResponse;
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;

/// `DELETE /api/v1/sessions/{sessionId}`
///
/// Drops the session's context and cancels any answer still being built for
/// it; that answer is discarded rather than delivered.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{sessionId}",
    tag = "sessions",
    params(("sessionId" = String, Path, description = "Session to end")),
    responses(
        (status = 200, description = "Session ended", body = EndSessionResponse),
        (status = 404, description = "No such session", body = ApiError),
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResponse<EndSessionResponse> {
    if state.pipeline.context().end_session(&session_id) {
        ApiResponse::success(EndSessionResponse {
            session_id,
            ended: true,
        })
    } else {
        ApiResponse::error(
            ErrorCode::NotFound,
            format!("No session named {session_id}"),
        )
    }
}
