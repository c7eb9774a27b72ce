use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;
use crate::cache::CacheStats;
use crate::config::parse_llm_provider_model;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub understanding: UnderstandingStatus,
    pub catalog: CatalogStatus,
    pub cache: CacheStats,
    /// Conversations currently held in memory.
    pub sessions: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UnderstandingStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CatalogStatus {
    pub version: u32,
    pub songs: usize,
    pub venues: usize,
}

/// `GET /api/v1/health`
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let pipeline = &state.pipeline;

    let understanding = if pipeline.resolver().is_available() {
        let (provider, model) = match &state.config.llm {
            Some(llm) => {
                let (provider, model) = parse_llm_provider_model(&llm.model);
                (Some(provider.to_string()), Some(model.to_string()))
            }
            None => (None, None),
        };
        UnderstandingStatus {
            status: "available".to_string(),
            provider,
            model,
        }
    } else {
        UnderstandingStatus {
            status: "unavailable".to_string(),
            provider: None,
            model: None,
        }
    };

    let catalog = pipeline.resolver().catalog();
    let status = if pipeline.resolver().is_available() {
        "ok"
    } else {
        "degraded"
    };

    ApiResponse::success(HealthData {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        understanding,
        catalog: CatalogStatus {
            version: catalog.version,
            songs: catalog.songs.len(),
            venues: catalog.venues.len(),
        },
        cache: pipeline.cache().stats(),
        sessions: pipeline.context().session_count(),
    })
}
