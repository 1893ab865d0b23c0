//! REST surface of the gateway: chat history retrieval and service
//! health, mounted alongside the WebSocket endpoint.
//!
//! Chat endpoints live under `/api/v1`; `/health` stays at the root for
//! load-balancer probes. With the default `swagger-ui` feature the
//! aggregated OpenAPI document is served at `/api-docs/openapi.json`
//! and an interactive UI at `/docs`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Aggregated OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "huddle-gateway",
        description = "Real-time chat and meeting notification gateway"
    ),
    paths(handlers::system::health_handler, handlers::chat::get_history),
    tags(
        (name = "System", description = "Service health"),
        (name = "Chat", description = "Chat history retrieval")
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn openapi_doc_lists_both_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(
            doc.paths
                .paths
                .contains_key("/api/v1/chat/history/{meeting_id}")
        );
    }
}
