// Demo data - a small directory and one item of each kind for local development

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    app_state::AppState,
    core::{Role, UserId},
    ent_schema::ContentKind,
    entities::{now_millis, UserRecord},
    error::{AppError, AppResult},
    infrastructure::{database::UserDirectory, viewer::ViewerContext},
};

const DEMO_USERS: [(i64, &str, &str, Role); 4] = [
    (1, "Alex Admin", "admin@campus.edu", Role::Admin),
    (2, "Dr. Rivera", "rivera@campus.edu", Role::Faculty),
    (3, "Sam Student", "sam@campus.edu", Role::Student),
    (4, "Jo Student", "jo@campus.edu", Role::Student),
];

fn object(value: Value) -> AppResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal("seed body must be an object".to_string())),
    }
}

/// Seed an empty directory. Returns false when data was already present.
pub async fn seed_demo_data(state: &AppState) -> AppResult<bool> {
    let users = state.content.users();
    if users.count_users().await? > 0 {
        info!("Directory already populated, skipping demo data");
        return Ok(false);
    }

    let mut viewers = Vec::new();
    for (id, name, email, role) in DEMO_USERS {
        users
            .upsert_user(&UserRecord {
                id: UserId(id),
                name: name.to_string(),
                email: email.to_string(),
                role,
                created_at: now_millis(),
            })
            .await?;

        let token = state.security.issue_token(UserId(id), role)?;
        info!("Demo {} {} <{}> token: {}", role, name, email, token);

        let session = state.security.validate_token(&token).await?;
        viewers.push(ViewerContext::authenticated(format!("seed-{}", id), session));
    }
    let (admin, faculty, student, other_student) =
        (&viewers[0], &viewers[1], &viewers[2], &viewers[3]);

    state
        .content
        .create(
            ContentKind::Announcement,
            admin,
            &object(json!({
                "title": "Welcome to the campus portal",
                "description": "Announcements, events and shared resources now live in one place."
            }))?,
        )
        .await?;

    let event = state
        .content
        .create(
            ContentKind::Event,
            faculty,
            &object(json!({
                "title": "Research showcase",
                "description": "Posters and demos from this term's projects.",
                "date": (Utc::now() + Duration::days(7)).to_rfc3339(),
                "location": "Main hall",
                "registrationLimit": 2
            }))?,
        )
        .await?;
    state.content.register(event.id, student).await?;

    let resource = state
        .content
        .create(
            ContentKind::Resource,
            faculty,
            &object(json!({
                "title": "Lab safety handbook",
                "description": "Required reading before your first lab session.",
                "fileUrl": "https://files.campus.edu/handbooks/lab-safety.pdf",
                "category": "Handbooks"
            }))?,
        )
        .await?;
    state
        .content
        .add_comment(
            ContentKind::Resource,
            resource.id,
            other_student,
            &object(json!({ "text": "Thanks, this is really useful." }))?,
        )
        .await?;
    state
        .content
        .toggle_like(ContentKind::Resource, resource.id, student)
        .await?;

    info!("Seeded {} demo users and 3 content items", DEMO_USERS.len());
    Ok(true)
}
