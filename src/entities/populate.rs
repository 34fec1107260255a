// Populate - resolves stored user ids into display snapshots before a record
// leaves the service. One batched directory lookup per call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{
    core::{CommentId, ItemId, UserId},
    ent_schema::ContentKind,
    entities::{ContentRecord, KindFields, LikeSummary, UserRecord, UserSummary},
    error::{AppError, AppResult},
    infrastructure::database::UserDirectory,
    schemas::schema_for,
};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedComment {
    pub id: CommentId,
    pub text: String,
    /// `None` when the author is no longer in the directory
    pub created_by: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// A content item as returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct PopulatedItem {
    pub id: ItemId,
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub owner_id: UserId,
    pub owner: Option<UserSummary>,
    pub fields: KindFields,
    pub comments: Vec<PopulatedComment>,
    pub likes: Vec<LikeSummary>,
    pub registered_users: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopulatedItem {
    fn resolve(record: ContentRecord, users: &HashMap<UserId, UserRecord>) -> Self {
        let summary = |id: &UserId| users.get(id).map(UserSummary::from);

        Self {
            id: record.id,
            kind: record.kind,
            title: record.title,
            description: record.description,
            owner_id: record.owner_id,
            owner: summary(&record.owner_id),
            fields: record.fields,
            comments: record
                .comments
                .into_iter()
                .map(|c| PopulatedComment {
                    id: c.id,
                    created_by: summary(&c.author_id),
                    text: c.text,
                    created_at: c.created_at,
                })
                .collect(),
            likes: record
                .likes
                .iter()
                .filter_map(|id| users.get(id).map(LikeSummary::from))
                .collect(),
            registered_users: record.registered_users.iter().filter_map(summary).collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn like_ids(&self) -> Vec<UserId> {
        self.likes.iter().map(|l| l.id).collect()
    }

    pub fn registered_ids(&self) -> Vec<UserId> {
        self.registered_users.iter().map(|u| u.id).collect()
    }
}

// The owner key differs per kind (`createdBy` / `uploadedBy`), so the wire
// shape is written by hand.
impl Serialize for PopulatedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry(schema_for(self.kind).owner_field(), &self.owner)?;

        match &self.fields {
            KindFields::Announcement => {}
            KindFields::Resource { file_url, category } => {
                map.serialize_entry("fileUrl", file_url)?;
                map.serialize_entry("category", category)?;
            }
            KindFields::Event {
                date,
                location,
                registration_limit,
            } => {
                map.serialize_entry("date", date)?;
                map.serialize_entry("location", location)?;
                map.serialize_entry("registrationLimit", registration_limit)?;
                map.serialize_entry("registeredUsers", &self.registered_users)?;
            }
        }

        map.serialize_entry("comments", &self.comments)?;
        map.serialize_entry("likes", &self.likes)?;
        map.serialize_entry("createdAt", &self.created_at)?;
        map.serialize_entry("updatedAt", &self.updated_at)?;
        map.end()
    }
}

/// Resolve every referenced user of a batch of records
pub async fn populate_many(
    records: Vec<ContentRecord>,
    directory: &dyn UserDirectory,
) -> AppResult<Vec<PopulatedItem>> {
    let mut ids: Vec<UserId> = records.iter().flat_map(|r| r.referenced_users()).collect();
    ids.sort_unstable();
    ids.dedup();

    let users: HashMap<UserId, UserRecord> = directory
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(records
        .into_iter()
        .map(|r| PopulatedItem::resolve(r, &users))
        .collect())
}

pub async fn populate(
    record: ContentRecord,
    directory: &dyn UserDirectory,
) -> AppResult<PopulatedItem> {
    populate_many(vec![record], directory)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("populate returned no item".to_string()))
}
