//! API middleware
//!
//! Contains middleware for:
//! - Authentication (optional session token validation)
//! - Authorization (editor checks)
//! - Site and current page resolution

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CmsConfig;
use crate::db::repositories::SiteRepository;
use crate::models::{Page, Site, User};
use crate::services::{PageRequest, PageService, PageServiceError, SessionService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub cms: Arc<CmsConfig>,
    pub page_service: Arc<PageService>,
    pub session_service: Arc<SessionService>,
    pub site_repo: Arc<dyn SiteRepository>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Site the request is addressed to
#[derive(Debug, Clone)]
pub struct CurrentSite(pub Site);

/// Page resolved for the request, once per request
#[derive(Debug, Clone)]
pub struct CurrentPage(pub Option<Page>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<PageServiceError> for ApiError {
    fn from(err: PageServiceError) -> Self {
        match err {
            PageServiceError::NotFound(msg) => ApiError::not_found(format!("Page not found: {}", msg)),
            PageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PageServiceError::InternalError(e) => {
                tracing::error!("Page service failed: {:#}", e);
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

/// Extract session token from request
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    cookie_value(request.headers(), "session").map(str::to_string)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Host header without port, lowercased
fn request_host(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let host = host.rsplit_once(':').map_or(host, |(name, _)| name);
    Some(host.to_ascii_lowercase())
}

/// Edit mode is requested with an `edit` query parameter or `cms_edit` cookie
fn wants_edit_mode(headers: &HeaderMap, query: &HashMap<String, String>) -> bool {
    query.contains_key("edit")
        || matches!(cookie_value(headers, "cms_edit"), Some("1") | Some("true"))
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(&request) {
        match state.session_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {:#}", e),
        }
    }
    next.run(request).await
}

/// Editor authorization middleware
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_editor() {
        return Err(ApiError::forbidden("Editor privileges required"));
    }

    Ok(next.run(request).await)
}

/// Site resolution middleware
///
/// Matches the Host header against known domains and falls back to the
/// configured site.
pub async fn current_site(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let by_host = match request_host(request.headers()) {
        Some(host) => state
            .site_repo
            .get_by_domain(&host)
            .await
            .map_err(|e| ApiError::internal_error(format!("Site lookup failed: {}", e)))?,
        None => None,
    };

    let site = match by_host {
        Some(site) => site,
        None => state
            .site_repo
            .get_by_id(state.cms.site_id)
            .await
            .map_err(|e| ApiError::internal_error(format!("Site lookup failed: {}", e)))?
            .ok_or_else(|| {
                ApiError::internal_error(format!("Site {} is not configured", state.cms.site_id))
            })?,
    };

    request.extensions_mut().insert(CurrentSite(site));
    Ok(next.run(request).await)
}

/// Current page middleware
///
/// Builds the `PageRequest` and resolves its page once; both land in the
/// request extensions. Runs after `optional_auth` and `current_site`.
pub async fn current_page(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let site = request
        .extensions()
        .get::<CurrentSite>()
        .map(|s| s.0.clone())
        .ok_or_else(|| ApiError::internal_error("Site not resolved"))?;

    let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|q| q.0)
        .unwrap_or_default();
    let path = urlencoding::decode(request.uri().path())
        .map(|p| p.into_owned())
        .map_err(|_| ApiError::validation_error("Request path is not valid UTF-8"))?;

    let mut page_request = PageRequest {
        path,
        edit_mode: wants_edit_mode(request.headers(), &query),
        query,
        user: get_authenticated_user(&request).cloned(),
        current_page: None,
    };

    let page = state
        .page_service
        .page_from_request(&site, &page_request, None, None)
        .await?;
    page_request.current_page = page.clone();

    request.extensions_mut().insert(CurrentPage(page));
    request.extensions_mut().insert(page_request);
    Ok(next.run(request).await)
}

/// Extract authenticated user from request extensions
pub fn get_authenticated_user(request: &Request) -> Option<&User> {
    request.extensions().get::<AuthenticatedUser>().map(|au| &au.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn create_request_with_cookie(cookie: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let request = create_request_with_auth("test-token-123");
        assert_eq!(extract_session_token(&request), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let request = create_request_with_cookie("theme=dark; session=test-token-456");
        assert_eq!(extract_session_token(&request), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer bearer-token")
            .header(header::COOKIE, "session=cookie-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&request), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_session_token(&request).is_none());

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic invalid")
            .body(Body::empty())
            .unwrap();
        assert!(extract_session_token(&request).is_none());
    }

    #[test]
    fn test_request_host_strips_port() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "Docs.Example.org:8080".parse().unwrap());
        assert_eq!(request_host(&headers), Some("docs.example.org".to_string()));
        assert_eq!(request_host(&HeaderMap::new()), None);
    }

    #[test]
    fn test_edit_mode_from_query_or_cookie() {
        let mut query = HashMap::new();
        assert!(!wants_edit_mode(&HeaderMap::new(), &query));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "cms_edit=1".parse().unwrap());
        assert!(wants_edit_mode(&headers, &query));

        headers.insert(header::COOKIE, "cms_edit=0".parse().unwrap());
        assert!(!wants_edit_mode(&headers, &query));

        query.insert("edit".to_string(), String::new());
        assert!(wants_edit_mode(&HeaderMap::new(), &query));
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::internal_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_page_service_error_mapping() {
        let err: ApiError = PageServiceError::NotFound("7".to_string()).into();
        assert_eq!(err.error.code, "NOT_FOUND");
        let err: ApiError = PageServiceError::ValidationError("bad".to_string()).into();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }
}
