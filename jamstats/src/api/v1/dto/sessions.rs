//! Session DTOs for the v1 API.

use serde::Serialize;

/// Response for `DELETE /v1/sessions/{sessionId}`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub session_id: String,
    pub ended: bool,
}
