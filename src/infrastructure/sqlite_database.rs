use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqliteConnection,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::{
    core::{CommentId, ItemId, Role, UserId},
    ent_schema::{ContentKind, FieldValues, SortOrder},
    entities::{from_millis, now_millis, CommentRecord, ContentRecord, KindFields, UserRecord},
    error::{AppError, AppResult},
    infrastructure::database::{
        CancellationOutcome, ContentStore, LikeToggle, RegistrationOutcome, UpdateOutcome,
        UserDirectory,
    },
};

const ITEM_COLUMNS: &str =
    "id, kind, title, description, owner_id, fields, created_at, updated_at";

/// SQLite implementation of the content store and user directory
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    /// Connect and create the schema. `sqlite::memory:` URLs get a single
    /// long-lived connection so every query sees the same database.
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::ConfigurationError(format!("Invalid database URL {}: {}", database_url, e))
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        if let Some(parent) = database_directory(database_url) {
            std::fs::create_dir_all(&parent).map_err(|e| {
                AppError::ConfigurationError(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", database_url, e))
        })?;

        let store = Self { pool };
        store.initialize().await?;
        info!("Content store ready at {}", database_url);
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create portal tables
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS content_items (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                owner_id INTEGER NOT NULL,
                fields TEXT NOT NULL,
                event_date INTEGER,
                registration_limit INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id INTEGER NOT NULL UNIQUE,
                item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (item_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (event_id, user_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_items_kind_created ON content_items(kind, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_items_kind_event_date ON content_items(kind, event_date)",
            "CREATE INDEX IF NOT EXISTS idx_comments_item ON comments(item_id, seq DESC)",
            "CREATE INDEX IF NOT EXISTS idx_likes_item ON likes(item_id, seq)",
            "CREATE INDEX IF NOT EXISTS idx_registrations_event ON registrations(event_id, seq)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create schema: {}", e)))?;
        }
        Ok(())
    }

    /// First statement of every single-item mutation. Takes SQLite's write
    /// lock for the rest of the transaction and reports whether the item
    /// exists with the expected kind.
    async fn claim_item(
        conn: &mut SqliteConnection,
        kind: ContentKind,
        id: ItemId,
        now_ms: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE content_items SET version = version + 1, updated_at = ? WHERE id = ? AND kind = ?",
        )
        .bind(now_ms)
        .bind(id.value())
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to claim item {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn roster_size(conn: &mut SqliteConnection, event_id: ItemId) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = ?")
            .bind(event_id.value())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to count registrations for {}: {}", event_id, e))
            })
    }

    async fn load_relations(&self, records: &mut [ContentRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = records.iter().map(|r| r.id.value()).collect();

        let comment_rows = self
            .fetch_related(
                "SELECT item_id, id, author_id, text, created_at FROM comments WHERE item_id IN (",
                &ids,
                " ORDER BY seq DESC",
            )
            .await?;
        let mut comments: HashMap<i64, Vec<CommentRecord>> = HashMap::new();
        for row in comment_rows {
            comments
                .entry(decode(&row, "item_id")?)
                .or_default()
                .push(CommentRecord {
                    id: CommentId(decode(&row, "id")?),
                    author_id: UserId(decode(&row, "author_id")?),
                    text: decode(&row, "text")?,
                    created_at: from_millis(decode(&row, "created_at")?),
                });
        }

        let likes = self
            .fetch_memberships(
                "SELECT item_id AS owner, user_id FROM likes WHERE item_id IN (",
                &ids,
            )
            .await?;
        let registrations = self
            .fetch_memberships(
                "SELECT event_id AS owner, user_id FROM registrations WHERE event_id IN (",
                &ids,
            )
            .await?;

        for record in records.iter_mut() {
            let key = record.id.value();
            record.comments = comments.remove(&key).unwrap_or_default();
            record.likes = likes.get(&key).cloned().unwrap_or_default();
            record.registered_users = registrations.get(&key).cloned().unwrap_or_default();
        }
        Ok(())
    }

    async fn fetch_related(&self, head: &str, ids: &[i64], tail: &str) -> AppResult<Vec<SqliteRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(head);
        let mut separated = qb.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");
        qb.push(tail);

        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to load item relations: {}", e)))
    }

    /// Memberships in insertion order, grouped by owning item
    async fn fetch_memberships(&self, head: &str, ids: &[i64]) -> AppResult<HashMap<i64, Vec<UserId>>> {
        let rows = self.fetch_related(head, ids, " ORDER BY seq ASC").await?;
        let mut grouped: HashMap<i64, Vec<UserId>> = HashMap::new();
        for row in rows {
            grouped
                .entry(decode(&row, "owner")?)
                .or_default()
                .push(UserId(decode(&row, "user_id")?));
        }
        Ok(grouped)
    }
}

/// Directory that has to exist before SQLite can create the file
fn database_directory(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") {
        return None;
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> AppResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| AppError::DatabaseError(format!("Failed to decode column {}: {}", column, e)))
}

fn decode_item(row: &SqliteRow) -> AppResult<ContentRecord> {
    let kind_str: String = decode(row, "kind")?;
    let kind = ContentKind::parse(&kind_str)
        .ok_or_else(|| AppError::DatabaseError(format!("Unknown content kind {}", kind_str)))?;
    let fields_json: String = decode(row, "fields")?;
    let fields: KindFields = serde_json::from_str(&fields_json).map_err(|e| {
        AppError::DatabaseError(format!("Corrupt fields for {} item: {}", kind, e))
    })?;

    Ok(ContentRecord {
        id: ItemId(decode(row, "id")?),
        kind,
        title: decode(row, "title")?,
        description: decode(row, "description")?,
        owner_id: UserId(decode(row, "owner_id")?),
        created_at: from_millis(decode(row, "created_at")?),
        updated_at: from_millis(decode(row, "updated_at")?),
        fields,
        comments: Vec::new(),
        likes: Vec::new(),
        registered_users: Vec::new(),
    })
}

fn decode_user(row: &SqliteRow) -> AppResult<UserRecord> {
    let role: String = decode(row, "role")?;
    Ok(UserRecord {
        id: UserId(decode(row, "id")?),
        name: decode(row, "name")?,
        email: decode(row, "email")?,
        role: Role::from_str(&role).map_err(AppError::DatabaseError)?,
        created_at: from_millis(decode(row, "created_at")?),
    })
}

fn encode_fields(fields: &KindFields) -> AppResult<String> {
    serde_json::to_string(fields)
        .map_err(|e| AppError::Internal(format!("Failed to encode item fields: {}", e)))
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn insert_item(&self, record: &ContentRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO content_items (id, kind, title, description, owner_id, fields, event_date, registration_limit, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.value())
        .bind(record.kind.as_str())
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.owner_id.value())
        .bind(encode_fields(&record.fields)?)
        .bind(record.fields.event_date().map(|d| d.timestamp_millis()))
        .bind(record.fields.registration_limit() as i64)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert item {}: {}", record.id, e)))?;
        Ok(())
    }

    async fn fetch_item(&self, kind: ContentKind, id: ItemId) -> AppResult<Option<ContentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM content_items WHERE id = ? AND kind = ?",
            ITEM_COLUMNS
        ))
        .bind(id.value())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get item {}: {}", id, e)))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut records = vec![decode_item(&row)?];
        self.load_relations(&mut records).await?;
        Ok(records.pop())
    }

    async fn list_items(&self, kind: ContentKind, order: SortOrder) -> AppResult<Vec<ContentRecord>> {
        let order_by = match order {
            SortOrder::CreatedDesc => "created_at DESC, id DESC",
            SortOrder::EventDateAsc => "event_date ASC, id ASC",
        };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM content_items WHERE kind = ? ORDER BY {}",
            ITEM_COLUMNS, order_by
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list {} items: {}", kind, e)))?;

        let mut records = rows.iter().map(decode_item).collect::<AppResult<Vec<_>>>()?;
        self.load_relations(&mut records).await?;
        Ok(records)
    }

    async fn update_item(
        &self,
        kind: ContentKind,
        id: ItemId,
        patch: &FieldValues,
        updated_at: DateTime<Utc>,
    ) -> AppResult<UpdateOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;
        let now_ms = updated_at.timestamp_millis();

        if !Self::claim_item(&mut tx, kind, id, now_ms).await? {
            return Ok(UpdateOutcome::NotFound);
        }

        // Merge into the row as it is now, not the caller's earlier read
        let row = sqlx::query(&format!(
            "SELECT {} FROM content_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id.value())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read item {}: {}", id, e)))?;
        let update = decode_item(&row)?.updated_with(patch, updated_at);

        let limit = update.fields.registration_limit() as i64;
        if limit > 0 && Self::roster_size(&mut tx, id).await? > limit {
            return Ok(UpdateOutcome::LimitBelowRoster);
        }

        sqlx::query(
            "UPDATE content_items SET title = ?, description = ?, fields = ?, event_date = ?, registration_limit = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(encode_fields(&update.fields)?)
        .bind(update.fields.event_date().map(|d| d.timestamp_millis()))
        .bind(limit)
        .bind(now_ms)
        .bind(id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update item {}: {}", id, e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit update: {}", e)))?;
        Ok(UpdateOutcome::Updated)
    }

    async fn delete_item(&self, kind: ContentKind, id: ItemId) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;

        let result = sqlx::query("DELETE FROM content_items WHERE id = ? AND kind = ?")
            .bind(id.value())
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete item {}: {}", id, e)))?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        // Foreign keys cascade already; clear explicitly in case they are off.
        for statement in [
            "DELETE FROM comments WHERE item_id = ?",
            "DELETE FROM likes WHERE item_id = ?",
            "DELETE FROM registrations WHERE event_id = ?",
        ] {
            sqlx::query(statement)
                .bind(id.value())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to delete relations of {}: {}", id, e))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit delete: {}", e)))?;
        Ok(true)
    }

    async fn push_comment(
        &self,
        kind: ContentKind,
        id: ItemId,
        comment: &CommentRecord,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;
        let now_ms = comment.created_at.timestamp_millis();

        if !Self::claim_item(&mut tx, kind, id, now_ms).await? {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO comments (id, item_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id.value())
        .bind(id.value())
        .bind(comment.author_id.value())
        .bind(&comment.text)
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to add comment to {}: {}", id, e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit comment: {}", e)))?;
        Ok(true)
    }

    async fn toggle_like(
        &self,
        kind: ContentKind,
        id: ItemId,
        user_id: UserId,
    ) -> AppResult<Option<LikeToggle>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;
        let now_ms = now_millis().timestamp_millis();

        if !Self::claim_item(&mut tx, kind, id, now_ms).await? {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM likes WHERE item_id = ? AND user_id = ?")
            .bind(id.value())
            .bind(user_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to remove like on {}: {}", id, e)))?;

        let toggle = if removed.rows_affected() > 0 {
            LikeToggle::Removed
        } else {
            sqlx::query("INSERT INTO likes (item_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(id.value())
                .bind(user_id.value())
                .bind(now_ms)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to add like on {}: {}", id, e)))?;
            LikeToggle::Added
        };

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit like: {}", e)))?;
        debug!("Like on {} by {}: {:?}", id, user_id, toggle);
        Ok(Some(toggle))
    }

    async fn register(&self, event_id: ItemId, user_id: UserId) -> AppResult<RegistrationOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;
        let now_ms = now_millis().timestamp_millis();

        if !Self::claim_item(&mut tx, ContentKind::Event, event_id, now_ms).await? {
            return Ok(RegistrationOutcome::NotFound);
        }

        let limit: i64 =
            sqlx::query_scalar("SELECT registration_limit FROM content_items WHERE id = ?")
                .bind(event_id.value())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to read limit of {}: {}", event_id, e))
                })?;

        if limit > 0 && Self::roster_size(&mut tx, event_id).await? >= limit {
            return Ok(RegistrationOutcome::LimitReached);
        }

        let already: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id.value())
        .bind(user_id.value())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to check registration: {}", e)))?;
        if already > 0 {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        sqlx::query("INSERT INTO registrations (event_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(event_id.value())
            .bind(user_id.value())
            .bind(now_ms)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to register for {}: {}", event_id, e))
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit registration: {}", e)))?;
        Ok(RegistrationOutcome::Registered)
    }

    async fn cancel_registration(
        &self,
        event_id: ItemId,
        user_id: UserId,
    ) -> AppResult<CancellationOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;
        let now_ms = now_millis().timestamp_millis();

        if !Self::claim_item(&mut tx, ContentKind::Event, event_id, now_ms).await? {
            return Ok(CancellationOutcome::NotFound);
        }

        let removed = sqlx::query("DELETE FROM registrations WHERE event_id = ? AND user_id = ?")
            .bind(event_id.value())
            .bind(user_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to cancel registration: {}", e))
            })?;
        if removed.rows_affected() == 0 {
            return Ok(CancellationOutcome::NotRegistered);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit cancellation: {}", e)))?;
        Ok(CancellationOutcome::Cancelled)
    }
}

#[async_trait]
impl UserDirectory for SqliteContentStore {
    async fn upsert_user(&self, user: &UserRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, role, created_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email, role = excluded.role",
        )
        .bind(user.id.value())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to upsert user {}: {}", user.id, e)))?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, name, email, role, created_at FROM users WHERE id = ?")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get user {}: {}", id, e)))?;
        row.as_ref().map(decode_user).transpose()
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        let rows = self
            .fetch_related(
                "SELECT id, name, email, role, created_at FROM users WHERE id IN (",
                &raw,
                "",
            )
            .await?;
        rows.iter().map(decode_user).collect()
    }

    async fn count_users(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count users: {}", e)))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ent_schema::{FieldValue, FieldValues};
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn values(pairs: &[(&'static str, FieldValue)]) -> FieldValues {
        pairs.iter().cloned().collect()
    }

    fn event(id: i64, owner: i64, limit: u32, days_ahead: i64) -> ContentRecord {
        let v = values(&[
            ("title", FieldValue::Text(format!("Event {}", id))),
            ("description", FieldValue::Text("Open to all".into())),
            ("date", FieldValue::DateTime(Utc::now() + Duration::days(days_ahead))),
            ("location", FieldValue::Text("Quad".into())),
            ("registrationLimit", FieldValue::Count(limit)),
        ]);
        ContentRecord::new(ItemId(id), ContentKind::Event, UserId(owner), &v, now_millis()).unwrap()
    }

    fn announcement(id: i64, owner: i64) -> ContentRecord {
        let v = values(&[
            ("title", FieldValue::Text(format!("Notice {}", id))),
            ("description", FieldValue::Text("Library hours".into())),
        ]);
        ContentRecord::new(ItemId(id), ContentKind::Announcement, UserId(owner), &v, now_millis())
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch_roundtrip() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        let record = event(1, 7, 10, 3);
        store.insert_item(&record).await.unwrap();

        let fetched = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        // Same id under another kind does not resolve
        assert!(store
            .fetch_item(ContentKind::Announcement, ItemId(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_registration_limit_and_order() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&event(1, 7, 2, 3)).await.unwrap();

        assert_eq!(store.register(ItemId(1), UserId(10)).await.unwrap(), RegistrationOutcome::Registered);
        assert_eq!(
            store.register(ItemId(1), UserId(10)).await.unwrap(),
            RegistrationOutcome::AlreadyRegistered
        );
        assert_eq!(store.register(ItemId(1), UserId(11)).await.unwrap(), RegistrationOutcome::Registered);
        assert_eq!(store.register(ItemId(1), UserId(12)).await.unwrap(), RegistrationOutcome::LimitReached);
        // Capacity is checked before duplicates
        assert_eq!(store.register(ItemId(1), UserId(10)).await.unwrap(), RegistrationOutcome::LimitReached);
        assert_eq!(store.register(ItemId(99), UserId(10)).await.unwrap(), RegistrationOutcome::NotFound);

        let fetched = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
        assert_eq!(fetched.registered_users, vec![UserId(10), UserId(11)]);
    }

    #[tokio::test]
    async fn test_cancellation_preserves_remaining_order() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&event(1, 7, 0, 3)).await.unwrap();
        for user in [1, 2, 3] {
            store.register(ItemId(1), UserId(user)).await.unwrap();
        }

        assert_eq!(
            store.cancel_registration(ItemId(1), UserId(2)).await.unwrap(),
            CancellationOutcome::Cancelled
        );
        assert_eq!(
            store.cancel_registration(ItemId(1), UserId(2)).await.unwrap(),
            CancellationOutcome::NotRegistered
        );

        let fetched = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
        assert_eq!(fetched.registered_users, vec![UserId(1), UserId(3)]);
    }

    #[tokio::test]
    async fn test_toggle_like_is_its_own_inverse() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&announcement(1, 7)).await.unwrap();

        let kind = ContentKind::Announcement;
        assert_eq!(store.toggle_like(kind, ItemId(1), UserId(3)).await.unwrap(), Some(LikeToggle::Added));
        assert_eq!(store.toggle_like(kind, ItemId(1), UserId(4)).await.unwrap(), Some(LikeToggle::Added));
        assert_eq!(store.toggle_like(kind, ItemId(1), UserId(3)).await.unwrap(), Some(LikeToggle::Removed));
        assert_eq!(store.toggle_like(kind, ItemId(2), UserId(3)).await.unwrap(), None);

        let fetched = store.fetch_item(kind, ItemId(1)).await.unwrap().unwrap();
        assert_eq!(fetched.likes, vec![UserId(4)]);
    }

    #[tokio::test]
    async fn test_concurrent_likes_are_not_lost() {
        let store = std::sync::Arc::new(SqliteContentStore::new_in_memory().await.unwrap());
        store.insert_item(&announcement(1, 7)).await.unwrap();

        let tasks: Vec<_> = (1..=20)
            .map(|user| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .toggle_like(ContentKind::Announcement, ItemId(1), UserId(user))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let fetched = store
            .fetch_item(ContentKind::Announcement, ItemId(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.likes.len(), 20);
    }

    #[tokio::test]
    async fn test_comments_are_newest_first() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&announcement(1, 7)).await.unwrap();

        for (id, text) in [(100, "first"), (101, "second"), (102, "third")] {
            let comment = CommentRecord::new(CommentId(id), UserId(3), text, now_millis());
            assert!(store
                .push_comment(ContentKind::Announcement, ItemId(1), &comment)
                .await
                .unwrap());
        }

        let fetched = store
            .fetch_item(ContentKind::Announcement, ItemId(1))
            .await
            .unwrap()
            .unwrap();
        let texts: Vec<&str> = fetched.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_delete_removes_relations() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&event(1, 7, 0, 3)).await.unwrap();
        store.register(ItemId(1), UserId(2)).await.unwrap();
        store
            .push_comment(
                ContentKind::Event,
                ItemId(1),
                &CommentRecord::new(CommentId(50), UserId(2), "see you", now_millis()),
            )
            .await
            .unwrap();

        assert!(!store.delete_item(ContentKind::Resource, ItemId(1)).await.unwrap());
        assert!(store.delete_item(ContentKind::Event, ItemId(1)).await.unwrap());
        assert!(store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().is_none());

        // Re-inserting the id starts with empty relations
        store.insert_item(&event(1, 7, 0, 3)).await.unwrap();
        let fresh = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
        assert!(fresh.comments.is_empty());
        assert!(fresh.registered_users.is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_limit_below_roster() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        let record = event(1, 7, 0, 3);
        store.insert_item(&record).await.unwrap();
        for user in [1, 2, 3] {
            store.register(ItemId(1), UserId(user)).await.unwrap();
        }

        let too_small = values(&[("registrationLimit", FieldValue::Count(2))]);
        assert_eq!(
            store
                .update_item(ContentKind::Event, ItemId(1), &too_small, now_millis())
                .await
                .unwrap(),
            UpdateOutcome::LimitBelowRoster
        );

        let renamed = values(&[
            ("title", FieldValue::Text("Renamed".into())),
            ("registrationLimit", FieldValue::Count(3)),
        ]);
        assert_eq!(
            store
                .update_item(ContentKind::Event, ItemId(1), &renamed, now_millis())
                .await
                .unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            store
                .update_item(ContentKind::Announcement, ItemId(1), &renamed, now_millis())
                .await
                .unwrap(),
            UpdateOutcome::NotFound
        );

        let fetched = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Renamed");
        assert_eq!(fetched.fields.registration_limit(), 3);
        assert_eq!(fetched.owner_id, UserId(7));
        assert_eq!(fetched.created_at, record.created_at);
    }

    #[tokio::test]
    async fn test_concurrent_partial_updates_keep_every_field() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("portal.db").display());
        let store = std::sync::Arc::new(SqliteContentStore::connect(&url, 8).await.unwrap());
        store.insert_item(&event(1, 7, 0, 3)).await.unwrap();

        for round in 0..10 {
            let location = format!("Hall {}", round);
            let mut tasks = Vec::new();
            {
                let store = store.clone();
                let patch = values(&[("location", FieldValue::Text(location.clone()))]);
                tasks.push(tokio::spawn(async move {
                    store.update_item(ContentKind::Event, ItemId(1), &patch, now_millis()).await
                }));
            }
            for n in 0..5 {
                let store = store.clone();
                let patch = values(&[("title", FieldValue::Text(format!("t{}", n)))]);
                tasks.push(tokio::spawn(async move {
                    store.update_item(ContentKind::Event, ItemId(1), &patch, now_millis()).await
                }));
            }
            for task in tasks {
                assert_eq!(task.await.unwrap().unwrap(), UpdateOutcome::Updated);
            }

            let fetched = store.fetch_item(ContentKind::Event, ItemId(1)).await.unwrap().unwrap();
            assert!(matches!(
                fetched.fields,
                KindFields::Event { location: ref l, .. } if *l == location
            ));
            assert!(fetched.title.starts_with('t'));
        }
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        store.insert_item(&event(1, 7, 0, 10)).await.unwrap();
        store.insert_item(&event(2, 7, 0, 2)).await.unwrap();
        store.insert_item(&event(3, 7, 0, 5)).await.unwrap();

        let events = store
            .list_items(ContentKind::Event, SortOrder::EventDateAsc)
            .await
            .unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.id.value()).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let mut older = announcement(10, 7);
        older.created_at = older.created_at - Duration::hours(1);
        store.insert_item(&older).await.unwrap();
        store.insert_item(&announcement(11, 7)).await.unwrap();
        let announcements = store
            .list_items(ContentKind::Announcement, SortOrder::CreatedDesc)
            .await
            .unwrap();
        let ids: Vec<i64> = announcements.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[tokio::test]
    async fn test_user_directory() {
        let store = SqliteContentStore::new_in_memory().await.unwrap();
        let user = UserRecord {
            id: UserId(5),
            name: "Priya".into(),
            email: "priya@campus.edu".into(),
            role: Role::Faculty,
            created_at: now_millis(),
        };
        store.upsert_user(&user).await.unwrap();
        assert_eq!(store.find_user(UserId(5)).await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_users(&[UserId(5), UserId(6)]).await.unwrap().len(), 1);
        assert!(store.find_users(&[]).await.unwrap().is_empty());
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[test]
    fn test_database_directory() {
        assert_eq!(
            database_directory("sqlite:data/campus_portal.db"),
            Some(PathBuf::from("data"))
        );
        assert_eq!(
            database_directory("sqlite:///var/lib/portal/db.sqlite?mode=rwc"),
            Some(PathBuf::from("/var/lib/portal"))
        );
        assert_eq!(database_directory("sqlite:portal.db"), None);
        assert_eq!(database_directory("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reconnect() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/portal.db").display());

        {
            let store = SqliteContentStore::connect(&url, 2).await.unwrap();
            store.insert_item(&announcement(1, 7)).await.unwrap();
        }

        let store = SqliteContentStore::connect(&url, 2).await.unwrap();
        assert!(store
            .fetch_item(ContentKind::Announcement, ItemId(1))
            .await
            .unwrap()
            .is_some());
    }
}
