use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;
use crate::{cache, error, models};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Jamstats API",
        version = "1.0.0",
        description = "Plain-English questions about setlists, song lengths, gaps and jam highlights.",
    ),
    paths(
        handlers::health::health_check,
        handlers::query::answer_question,
        handlers::query::suggestions,
        handlers::sessions::end_session,
        handlers::admin::invalidate_cache,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        // Query
        dto::QueryRequest,
        dto::QueryResponse,
        dto::SuggestionsResponse,
        models::Card,
        error::FailureView,
        // Sessions
        dto::EndSessionResponse,
        // Admin
        dto::InvalidateCacheRequest,
        dto::InvalidateCacheResponse,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::UnderstandingStatus,
        handlers::health::CatalogStatus,
        cache::CacheStats,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "query", description = "Question answering and starter questions"),
        (name = "sessions", description = "Conversation lifecycle"),
        (name = "admin", description = "Administrative operations (auth required)"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
