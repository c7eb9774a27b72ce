//! Admin DTOs for the v1 API.

use serde::{Deserialize, Serialize};

/// Request body for `POST /v1/admin/cache:invalidate`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateCacheRequest {
    /// `static`, `historical` or `recency`. Every class is cleared when absent.
    #[serde(default)]
    pub ttl_class: Option<String>,
}

/// Response for `POST /v1/admin/cache:invalidate`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateCacheResponse {
    /// Number of cache entries dropped.
    pub dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_class: Option<String>,
}
