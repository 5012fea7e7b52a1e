//! API layer - HTTP handlers and routing
//!
//! - Page tree routes (`/` and `/{*path}`)
//! - Page API endpoints below `/api`

pub mod middleware;
pub mod pages;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, CurrentPage, CurrentSite};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let editor_routes = pages::editor_router()
        .route_layer(axum_middleware::from_fn(middleware::require_editor));

    Router::new()
        .merge(pages::public_router())
        .merge(editor_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::current_site,
        ))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let page_routes = pages::page_router()
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::current_page,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::current_site,
        ));

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .merge(page_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
