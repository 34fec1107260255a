// Session endpoints and the health probe

use axum::{extract::State, response::Json, routing::{get, post}, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    app_state::AppState,
    entities::UserRecord,
    error::{AppError, AppResult},
    infrastructure::{database::UserDirectory, middleware::Vc},
};

/// The caller's directory entry
async fn me_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<UserRecord>> {
    let session = vc.require_session()?;
    let user = state
        .content
        .users()
        .find_user(session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

async fn logout_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let session = vc.require_session()?;
    state.security.logout(session).await?;
    info!("User {} logged out ({})", session.user_id, vc.request_id);
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "timestamp": chrono::Utc::now(),
    }))
}

pub fn create_auth_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/me", get(me_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}
