// Database Interface - storage contracts for content items and the user directory
// Each mutating call touches exactly one item and is atomic on its own

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{
    core::{ItemId, UserId},
    ent_schema::{ContentKind, FieldValues, SortOrder},
    entities::{CommentRecord, ContentRecord, UserRecord},
    error::AppResult,
    infrastructure::cache::Cache,
};

/// Result of a like toggle on an existing item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Added,
    Removed,
}

/// Result of an update; the store enforces the roster invariant itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The new positive limit is below the current roster size
    LimitBelowRoster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    NotFound,
    LimitReached,
    AlreadyRegistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationOutcome {
    Cancelled,
    NotFound,
    NotRegistered,
}

/// Persistence for content items. Mutations are conditional updates scoped to
/// one item, so concurrent requests against the same item cannot lose writes.
/// `None`/`false` results mean the item (of that kind) does not exist.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_item(&self, record: &ContentRecord) -> AppResult<()>;
    async fn fetch_item(&self, kind: ContentKind, id: ItemId) -> AppResult<Option<ContentRecord>>;
    async fn list_items(&self, kind: ContentKind, order: SortOrder)
        -> AppResult<Vec<ContentRecord>>;
    /// Merges a validated partial draft into the current row. The read and
    /// the write happen under the same item claim.
    async fn update_item(
        &self,
        kind: ContentKind,
        id: ItemId,
        patch: &FieldValues,
        updated_at: DateTime<Utc>,
    ) -> AppResult<UpdateOutcome>;
    /// Removes the item together with its comments, likes and registrations
    async fn delete_item(&self, kind: ContentKind, id: ItemId) -> AppResult<bool>;
    /// Prepends to the comment thread
    async fn push_comment(
        &self,
        kind: ContentKind,
        id: ItemId,
        comment: &CommentRecord,
    ) -> AppResult<bool>;
    /// Remove-if-present, add-if-absent
    async fn toggle_like(
        &self,
        kind: ContentKind,
        id: ItemId,
        user_id: UserId,
    ) -> AppResult<Option<LikeToggle>>;
    async fn register(&self, event_id: ItemId, user_id: UserId) -> AppResult<RegistrationOutcome>;
    async fn cancel_registration(
        &self,
        event_id: ItemId,
        user_id: UserId,
    ) -> AppResult<CancellationOutcome>;
}

/// Read model of the users the identity service has provisioned
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn upsert_user(&self, user: &UserRecord) -> AppResult<()>;
    async fn find_user(&self, id: UserId) -> AppResult<Option<UserRecord>>;
    /// Unknown ids are skipped
    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserRecord>>;
    async fn count_users(&self) -> AppResult<u64>;
}

/// LRU front for a directory. Populate resolves the same handful of users on
/// nearly every response.
pub struct CachedUserDirectory {
    inner: Arc<dyn UserDirectory>,
    cache: Mutex<Cache<UserId, UserRecord>>,
}

impl CachedUserDirectory {
    pub fn new(inner: Arc<dyn UserDirectory>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(Cache::new(capacity)),
        }
    }
}

#[async_trait]
impl UserDirectory for CachedUserDirectory {
    async fn upsert_user(&self, user: &UserRecord) -> AppResult<()> {
        self.inner.upsert_user(user).await?;
        self.cache.lock().await.remove(&user.id);
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<UserRecord>> {
        if let Some(user) = self.cache.lock().await.get(&id) {
            return Ok(Some(user));
        }
        let user = self.inner.find_user(id).await?;
        if let Some(user) = &user {
            self.cache.lock().await.insert(id, user.clone());
        }
        Ok(user)
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserRecord>> {
        let mut found: HashMap<UserId, UserRecord> = HashMap::new();
        let mut missing = Vec::new();
        {
            let mut cache = self.cache.lock().await;
            for id in ids {
                match cache.get(id) {
                    Some(user) => {
                        found.insert(*id, user);
                    }
                    None => missing.push(*id),
                }
            }
        }

        if !missing.is_empty() {
            let loaded = self.inner.find_users(&missing).await?;
            let mut cache = self.cache.lock().await;
            for user in loaded {
                cache.insert(user.id, user.clone());
                found.insert(user.id, user);
            }
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn count_users(&self) -> AppResult<u64> {
        self.inner.count_users().await
    }
}
