//! Page endpoints
//!
//! `GET /` and `GET /{*path}` render the page resolved by the
//! `current_page` middleware. Everything below `/api` works on the site
//! resolved by `current_site`.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, CurrentPage, CurrentSite};
use crate::models::{Page, PageNode, Title};
use crate::services::{select_template, PageRequest};

/// Editor-only page management routes
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/pages", get(list_pages))
        .route("/pages/{id}/copy", post(copy_page))
}

/// Public API routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/pages/available-slug", get(available_slug))
        .route("/nodes", get(list_nodes))
}

/// Page tree routes, served through `current_page`
pub fn page_router() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_page))
        .route("/{*path}", get(serve_page))
}

#[derive(Serialize)]
struct ServedPage {
    page: Page,
    title: Option<Title>,
    template: String,
}

#[derive(Serialize)]
struct PagesResponse {
    pages: Vec<Page>,
}

#[derive(Serialize)]
struct PageResponse {
    page: Page,
}

#[derive(Serialize)]
struct NodesResponse {
    nodes: Vec<PageNode>,
}

#[derive(Serialize)]
struct SlugResponse {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    path: String,
    #[serde(default)]
    preview: bool,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct SlugQuery {
    path: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct NodesQuery {
    #[serde(default)]
    published: bool,
}

async fn serve_page(
    State(state): State<AppState>,
    Extension(CurrentPage(page)): Extension<CurrentPage>,
    Extension(request): Extension<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let page = page.ok_or_else(|| ApiError::not_found("Page not found"))?;
    let title = page.title_for(request.query_param("language")).cloned();
    let template = select_template(&state.cms.templates, &request);
    Ok(Json(ServedPage {
        page,
        title,
        template,
    }))
}

async fn list_pages(
    State(state): State<AppState>,
    Extension(CurrentSite(site)): Extension<CurrentSite>,
    Query(query): Query<PagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pages = state
        .page_service
        .find_pages(&site, query.path.trim_matches('/'), query.preview, query.draft)
        .await?;
    Ok(Json(PagesResponse { pages }))
}

async fn available_slug(
    State(state): State<AppState>,
    Extension(CurrentSite(site)): Extension<CurrentSite>,
    Query(query): Query<SlugQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let path = query.path.trim_matches('/');
    if path.is_empty() {
        return Err(ApiError::validation_error("Path cannot be empty"));
    }
    let slug = state
        .page_service
        .available_slug(&site, path, &query.language)
        .await?;
    Ok(Json(SlugResponse { slug }))
}

async fn copy_page(
    State(state): State<AppState>,
    Extension(CurrentSite(site)): Extension<CurrentSite>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page_service.copy_page(&site, id, Some(&user)).await?;
    Ok((StatusCode::CREATED, Json(PageResponse { page })))
}

async fn list_nodes(
    State(state): State<AppState>,
    Extension(CurrentSite(site)): Extension<CurrentSite>,
    Query(query): Query<NodesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = state.page_service.find_nodes(&site, query.published).await?;
    Ok(Json(NodesResponse { nodes }))
}
