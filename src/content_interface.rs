// Unified Content Interface - every operation on announcements, events and resources
// Kind differences come from the schemas; this layer never branches on a concrete kind

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path as AxumPath, Request, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    core::{CommentId, ItemId},
    ent_framework::{PrivacyContext, PrivacyOperation, PrivacyPolicy},
    ent_schema::{validate_draft, ContentKind, DraftMode},
    entities::{now_millis, populate, populate_many, CommentRecord, ContentRecord, PopulatedItem},
    error::{AppError, AppResult, FieldError},
    infrastructure::{
        database::{
            CachedUserDirectory, CancellationOutcome, ContentStore, LikeToggle,
            RegistrationOutcome, UpdateOutcome,
        },
        id_generator::ContentIdGenerator,
        middleware::Vc,
        viewer::ViewerContext,
    },
    schemas::schema_for,
};

#[derive(Clone)]
pub struct ContentInterface {
    store: Arc<dyn ContentStore>,
    users: Arc<CachedUserDirectory>,
    id_generator: Arc<ContentIdGenerator>,
    policy: Arc<PrivacyPolicy>,
}

impl ContentInterface {
    pub fn new(
        store: Arc<dyn ContentStore>,
        users: Arc<CachedUserDirectory>,
        id_generator: Arc<ContentIdGenerator>,
    ) -> Self {
        Self {
            store,
            users,
            id_generator,
            policy: Arc::new(PrivacyPolicy::default()),
        }
    }

    pub fn users(&self) -> &Arc<CachedUserDirectory> {
        &self.users
    }

    async fn authorize(
        &self,
        kind: ContentKind,
        operation: PrivacyOperation,
        vc: &ViewerContext,
        owner: Option<&ContentRecord>,
    ) -> AppResult<()> {
        let ctx = PrivacyContext {
            kind,
            operation,
            viewer: vc,
            owner_id: owner.map(|record| record.owner_id),
        };
        self.policy.enforce(&ctx).await
    }

    async fn fetch_or_not_found(&self, kind: ContentKind, id: ItemId) -> AppResult<ContentRecord> {
        self.store
            .fetch_item(kind, id)
            .await?
            .ok_or_else(|| not_found(kind))
    }

    /// Re-read after a mutation so the response reflects the committed state
    async fn populated(&self, kind: ContentKind, id: ItemId) -> AppResult<PopulatedItem> {
        let record = self.fetch_or_not_found(kind, id).await?;
        populate(record, self.users.as_ref()).await
    }

    pub async fn list(&self, kind: ContentKind, vc: &ViewerContext) -> AppResult<Vec<PopulatedItem>> {
        self.authorize(kind, PrivacyOperation::Read, vc, None).await?;
        let records = self.store.list_items(kind, schema_for(kind).sort_order()).await?;
        populate_many(records, self.users.as_ref()).await
    }

    pub async fn get(&self, kind: ContentKind, id: ItemId, vc: &ViewerContext) -> AppResult<PopulatedItem> {
        let record = self.fetch_or_not_found(kind, id).await?;
        self.authorize(kind, PrivacyOperation::Read, vc, Some(&record)).await?;
        populate(record, self.users.as_ref()).await
    }

    pub async fn create(
        &self,
        kind: ContentKind,
        vc: &ViewerContext,
        body: &Map<String, Value>,
    ) -> AppResult<PopulatedItem> {
        self.authorize(kind, PrivacyOperation::Create, vc, None).await?;
        let owner_id = vc.require_session()?.user_id;

        let values = validate_draft(schema_for(kind), body, DraftMode::Create)
            .map_err(AppError::Validation)?;
        let id = ItemId(self.id_generator.next_id()?);
        let record = ContentRecord::new(id, kind, owner_id, &values, now_millis())?;

        self.store.insert_item(&record).await?;
        info!("{} {} created by {} ({})", kind.label(), id, owner_id, vc.request_id);
        populate(record, self.users.as_ref()).await
    }

    pub async fn update(
        &self,
        kind: ContentKind,
        id: ItemId,
        vc: &ViewerContext,
        body: &Map<String, Value>,
    ) -> AppResult<PopulatedItem> {
        vc.require_session()?;
        let values = validate_draft(schema_for(kind), body, DraftMode::Update)
            .map_err(AppError::Validation)?;

        let record = self.fetch_or_not_found(kind, id).await?;
        self.authorize(kind, PrivacyOperation::Update, vc, Some(&record)).await?;

        match self.store.update_item(kind, id, &values, now_millis()).await? {
            UpdateOutcome::Updated => {}
            UpdateOutcome::NotFound => return Err(not_found(kind)),
            UpdateOutcome::LimitBelowRoster => {
                return Err(AppError::BadRequest(
                    "Registration limit cannot be lower than the number of registered users"
                        .to_string(),
                ))
            }
        }

        info!("{} {} updated ({})", kind.label(), id, vc.request_id);
        self.populated(kind, id).await
    }

    /// Returns the confirmation message
    pub async fn delete(&self, kind: ContentKind, id: ItemId, vc: &ViewerContext) -> AppResult<String> {
        vc.require_session()?;
        let record = self.fetch_or_not_found(kind, id).await?;
        self.authorize(kind, PrivacyOperation::Delete, vc, Some(&record)).await?;

        if !self.store.delete_item(kind, id).await? {
            return Err(not_found(kind));
        }

        info!("{} {} deleted ({})", kind.label(), id, vc.request_id);
        Ok(format!("{} deleted successfully", kind.label()))
    }

    pub async fn add_comment(
        &self,
        kind: ContentKind,
        id: ItemId,
        vc: &ViewerContext,
        body: &Map<String, Value>,
    ) -> AppResult<PopulatedItem> {
        self.authorize(kind, PrivacyOperation::Interact, vc, None).await?;
        let author_id = vc.require_session()?.user_id;

        let text = body
            .get("text")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation(vec![FieldError::body("text", "Text is required")]))?;

        let comment = CommentRecord::new(
            CommentId(self.id_generator.next_id()?),
            author_id,
            text,
            now_millis(),
        );
        if !self.store.push_comment(kind, id, &comment).await? {
            return Err(not_found(kind));
        }

        info!("Comment {} added to {} {} by {}", comment.id, kind, id, author_id);
        self.populated(kind, id).await
    }

    pub async fn toggle_like(&self, kind: ContentKind, id: ItemId, vc: &ViewerContext) -> AppResult<PopulatedItem> {
        self.authorize(kind, PrivacyOperation::Interact, vc, None).await?;
        let user_id = vc.require_session()?.user_id;

        if !schema_for(kind).capabilities().has_likes {
            return Err(AppError::BadRequest(format!("{} items cannot be liked", kind.label())));
        }

        match self.store.toggle_like(kind, id, user_id).await? {
            None => return Err(not_found(kind)),
            Some(LikeToggle::Added) => info!("{} liked {} {}", user_id, kind, id),
            Some(LikeToggle::Removed) => info!("{} unliked {} {}", user_id, kind, id),
        }
        self.populated(kind, id).await
    }

    pub async fn register(&self, event_id: ItemId, vc: &ViewerContext) -> AppResult<PopulatedItem> {
        let kind = ContentKind::Event;
        self.authorize(kind, PrivacyOperation::Interact, vc, None).await?;
        let user_id = vc.require_session()?.user_id;

        match self.store.register(event_id, user_id).await? {
            RegistrationOutcome::Registered => {
                info!("{} registered for event {}", user_id, event_id);
            }
            RegistrationOutcome::NotFound => return Err(not_found(kind)),
            RegistrationOutcome::LimitReached => {
                return Err(AppError::BadRequest("Registration limit reached".to_string()))
            }
            RegistrationOutcome::AlreadyRegistered => {
                return Err(AppError::BadRequest(
                    "You are already registered for this event".to_string(),
                ))
            }
        }
        self.populated(kind, event_id).await
    }

    pub async fn cancel_registration(&self, event_id: ItemId, vc: &ViewerContext) -> AppResult<PopulatedItem> {
        let kind = ContentKind::Event;
        self.authorize(kind, PrivacyOperation::Interact, vc, None).await?;
        let user_id = vc.require_session()?.user_id;

        match self.store.cancel_registration(event_id, user_id).await? {
            CancellationOutcome::Cancelled => {
                info!("{} cancelled registration for event {}", user_id, event_id);
            }
            CancellationOutcome::NotFound => return Err(not_found(kind)),
            CancellationOutcome::NotRegistered => {
                return Err(AppError::BadRequest(
                    "You are not registered for this event".to_string(),
                ))
            }
        }
        self.populated(kind, event_id).await
    }
}

fn not_found(kind: ContentKind) -> AppError {
    AppError::NotFound(format!("{} not found", kind.label()))
}

/// Ids that do not parse cannot name an existing item
fn parse_id(kind: ContentKind, raw: &str) -> AppResult<ItemId> {
    raw.parse::<ItemId>().map_err(|_| not_found(kind))
}

/// JSON body extractor whose rejections use the portal's error shape
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => {
                warn!("Rejected request body: {}", rejection.body_text());
                Err(AppError::BadRequest(rejection.body_text()))
            }
        }
    }
}

// HTTP Handlers

#[derive(Clone)]
struct KindState {
    content: ContentInterface,
    kind: ContentKind,
}

async fn list_handler(
    State(state): State<KindState>,
    vc: Vc,
) -> AppResult<Json<Vec<PopulatedItem>>> {
    Ok(Json(state.content.list(state.kind, &vc).await?))
}

async fn get_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.get(state.kind, id, &vc).await?))
}

async fn create_handler(
    State(state): State<KindState>,
    vc: Vc,
    Payload(body): Payload<Map<String, Value>>,
) -> AppResult<(StatusCode, Json<PopulatedItem>)> {
    let item = state.content.create(state.kind, &vc, &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
    Payload(body): Payload<Map<String, Value>>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.update(state.kind, id, &vc, &body).await?))
}

async fn delete_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(state.kind, &id)?;
    let message = state.content.delete(state.kind, id, &vc).await?;
    Ok(Json(json!({ "message": message })))
}

async fn comment_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
    Payload(body): Payload<Map<String, Value>>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.add_comment(state.kind, id, &vc, &body).await?))
}

async fn like_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.toggle_like(state.kind, id, &vc).await?))
}

async fn register_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.register(id, &vc).await?))
}

async fn cancel_handler(
    State(state): State<KindState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<PopulatedItem>> {
    let id = parse_id(state.kind, &id)?;
    Ok(Json(state.content.cancel_registration(id, &vc).await?))
}

/// Routes for one kind; optional endpoints follow the kind's capabilities
fn kind_router(content: ContentInterface, kind: ContentKind) -> Router {
    let schema = schema_for(kind);
    let collection = format!("/{}", kind.collection());
    let item = format!("{}/{{id}}", collection);

    let mut router = Router::new()
        .route(&collection, get(list_handler).post(create_handler))
        .route(&item, get(get_handler).put(update_handler).delete(delete_handler))
        .route(&format!("{}/comments", item), post(comment_handler));

    if schema.capabilities().has_likes {
        router = router.route(&format!("{}/like", item), post(like_handler));
    }
    if schema.capabilities().has_registration {
        router = router
            .route(&format!("{}/register", item), post(register_handler))
            .route(&format!("{}/cancel", item), post(cancel_handler));
    }

    router.with_state(KindState { content, kind })
}

// Create unified router
pub fn create_content_router(content: ContentInterface) -> Router {
    ContentKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| {
            router.merge(kind_router(content.clone(), kind))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, UserId};
    use crate::entities::UserRecord;
    use crate::infrastructure::{
        database::UserDirectory, sqlite_database::SqliteContentStore, viewer::Session,
    };
    use chrono::Utc;

    async fn interface() -> ContentInterface {
        let store = Arc::new(SqliteContentStore::new_in_memory().await.unwrap());
        for (id, name, role) in [(1, "Owner", Role::Faculty), (2, "Other", Role::Student)] {
            store
                .upsert_user(&UserRecord {
                    id: UserId(id),
                    name: name.to_string(),
                    email: format!("{}@campus.edu", name.to_lowercase()),
                    role,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let users = Arc::new(CachedUserDirectory::new(store.clone(), 64));
        ContentInterface::new(store, users, Arc::new(ContentIdGenerator::new(1).unwrap()))
    }

    fn viewer(id: i64, role: Role) -> ViewerContext {
        ViewerContext::authenticated(
            "test".to_string(),
            Session {
                session_id: format!("s-{}", id),
                user_id: UserId(id),
                role,
                issued_at: Utc::now(),
                expires_at: Utc::now(),
            },
        )
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_owner_from_viewer() {
        let content = interface().await;
        let owner = viewer(1, Role::Faculty);
        let item = content
            .create(
                ContentKind::Resource,
                &owner,
                &body(json!({
                    "title": "Syllabus",
                    "description": "Fall term",
                    "fileUrl": "https://files.campus.edu/syllabus.pdf",
                    "category": "Course",
                    "uploadedBy": 2
                })),
            )
            .await
            .unwrap();

        assert_eq!(item.owner_id, UserId(1));
        assert_eq!(item.owner.as_ref().map(|o| o.name.as_str()), Some("Owner"));
    }

    #[tokio::test]
    async fn test_update_checks_existence_before_ownership() {
        let content = interface().await;
        let other = viewer(2, Role::Student);
        let err = content
            .update(ContentKind::Announcement, ItemId(404), &other, &body(json!({"title": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Announcement not found"));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_delete() {
        let content = interface().await;
        let owner = viewer(1, Role::Faculty);
        let item = content
            .create(
                ContentKind::Announcement,
                &owner,
                &body(json!({"title": "Closure", "description": "Snow day"})),
            )
            .await
            .unwrap();

        let err = content
            .delete(ContentKind::Announcement, item.id, &viewer(2, Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Not authorized to delete this announcement"));

        let message = content
            .delete(ContentKind::Announcement, item.id, &viewer(9, Role::Admin))
            .await
            .unwrap();
        assert_eq!(message, "Announcement deleted successfully");
    }

    #[tokio::test]
    async fn test_blank_comment_is_validation_error() {
        let content = interface().await;
        let err = content
            .add_comment(
                ContentKind::Event,
                ItemId(1),
                &viewer(2, Role::Student),
                &body(json!({"text": "   "})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref errors) if errors[0].msg == "Text is required"));
    }

    #[tokio::test]
    async fn test_anonymous_cannot_register() {
        let content = interface().await;
        let err = content
            .register(ItemId(1), &ViewerContext::anonymous("test".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "No token, authorization denied"));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(ContentKind::Event, "42").unwrap(), ItemId(42));
        assert!(matches!(
            parse_id(ContentKind::Event, "abc"),
            Err(AppError::NotFound(ref m)) if m == "Event not found"
        ));
    }
}
