// ViewerContext Extractor - hands the request's viewer to handlers

use std::sync::Arc;
use crate::{error::AppError, infrastructure::viewer::ViewerContext};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Cheap-to-clone handle on the request's ViewerContext. Derefs to the
/// context so handlers can write `vc.user_id()` directly.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// The middleware always inserts a context; a missing one is a wiring bug
impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or_else(|| AppError::Internal("ViewerContext missing from request".to_string()));

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_inserted_context() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(Arc::new(ViewerContext::anonymous("test-request".to_string())));

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.request_id, "test-request");
        assert!(!vc.is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = Vc::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
