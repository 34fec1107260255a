// ViewerContext Middleware - turns the bearer token into a request-scoped viewer
// Never rejects a request itself; operations decide whether a session is required

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::infrastructure::{security::SecurityService, viewer::ViewerContext};

/// Application state that can validate tokens
pub trait HasSecurityService {
    fn security(&self) -> &Arc<SecurityService>;
}

/// Credentials found on the request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthInfo {
    None,
    Bearer(String),
    /// An Authorization header that is not a bearer token
    Malformed,
}

/// ViewerContext middleware that creates request-scoped viewer context
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Response
where
    T: HasSecurityService + Clone + Send + Sync + 'static,
{
    let auth_info = extract_auth_from_request(request.headers());
    let viewer_context = create_viewer_context(auth_info, app_state.security()).await;

    request.extensions_mut().insert(viewer_context);
    next.run(request).await
}

/// Extract authentication information from request headers
fn extract_auth_from_request(headers: &HeaderMap) -> AuthInfo {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return AuthInfo::None;
    };

    match auth_header.to_str() {
        Ok(value) => match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => AuthInfo::Bearer(token.trim().to_string()),
            _ => AuthInfo::Malformed,
        },
        Err(_) => AuthInfo::Malformed,
    }
}

async fn create_viewer_context(
    auth_info: AuthInfo,
    security: &SecurityService,
) -> Arc<ViewerContext> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match auth_info {
        AuthInfo::None => ViewerContext::anonymous(request_id),
        AuthInfo::Malformed => ViewerContext::rejected(request_id),
        AuthInfo::Bearer(token) => match security.validate_token(&token).await {
            Ok(session) => ViewerContext::authenticated(request_id, session),
            Err(e) => {
                debug!("Rejected bearer token on {}: {}", request_id, e);
                ViewerContext::rejected(request_id)
            }
        },
    };

    Arc::new(viewer_context)
}
