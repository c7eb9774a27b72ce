//! v1 Admin handlers.

use axum::extract::State;

use crate::api::extractors::AppJson;
use crate::api::v1::dto::{InvalidateCacheRequest, InvalidateCacheResponse};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::models::TtlClass;

/// `POST /api/v1/admin/cache:invalidate`
#[utoipa::path(
    post,
    path = "/api/v1/admin/cache:invalidate",
    tag = "admin",
    request_body = InvalidateCacheRequest,
    responses(
        (status = 200, description = "Cache entries dropped", body = InvalidateCacheResponse),
        (status = 400, description = "Unknown TTL class", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn invalidate_cache(
    State(state): State<AppState>,
    AppJson(req): AppJson<InvalidateCacheRequest>,
) -> ApiResponse<InvalidateCacheResponse> {
    let class = match req.ttl_class.as_deref().map(str::parse::<TtlClass>) {
        None => None,
        Some(Ok(class)) => Some(class),
        Some(Err(e)) => return ApiResponse::error(ErrorCode::InvalidRequest, e),
    };

    let dropped = state.pipeline.cache().invalidate(class);

    ApiResponse::success(InvalidateCacheResponse {
        dropped,
        ttl_class: class.map(|c| c.to_string()),
    })
}
