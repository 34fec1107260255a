use std::sync::Arc;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use crate::{
    auth_interface::create_auth_router,
    config::Config,
    content_interface::{create_content_router, ContentInterface},
    error::AppError,
    infrastructure::{
        database::CachedUserDirectory,
        id_generator::ContentIdGenerator,
        middleware::{viewer_context_middleware, HasSecurityService},
        security::SecurityService,
        sqlite_database::SqliteContentStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub content: ContentInterface,
    pub security: Arc<SecurityService>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(
            SqliteContentStore::connect(&config.database.url, config.database.max_connections)
                .await?,
        );
        let users = Arc::new(CachedUserDirectory::new(store.clone(), config.cache.capacity));
        let id_generator = Arc::new(ContentIdGenerator::new(0)?);

        let content = ContentInterface::new(store, users, id_generator);
        let security = Arc::new(SecurityService::new(config.security()));

        Ok(Self {
            content,
            security,
            config,
        })
    }

    /// Every API route under `/api`, behind the viewer context middleware
    pub fn router(&self) -> Router {
        let api = create_content_router(self.content.clone())
            .merge(create_auth_router(self.clone()))
            .method_not_allowed_fallback(method_not_allowed)
            .layer(middleware::from_fn_with_state(
                self.clone(),
                viewer_context_middleware::<AppState>,
            ));

        Router::new().nest("/api", api).fallback(route_not_found)
    }
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "message": "Method not allowed" })),
    )
        .into_response()
}

impl HasSecurityService for AppState {
    fn security(&self) -> &Arc<SecurityService> {
        &self.security
    }
}
