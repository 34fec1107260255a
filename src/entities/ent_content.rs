// EntContent - the generic announcement / event / resource record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    core::{ItemId, UserId},
    ent_schema::{ContentKind, FieldValues},
    entities::ent_comment::CommentRecord,
    error::{AppError, AppResult},
};

/// Attributes that only some kinds carry. Stored as JSON next to the common
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KindFields {
    Announcement,
    Resource {
        file_url: String,
        category: String,
    },
    Event {
        date: DateTime<Utc>,
        location: String,
        registration_limit: u32,
    },
}

impl KindFields {
    /// Build from values validated in create mode
    pub fn from_values(kind: ContentKind, values: &FieldValues) -> AppResult<Self> {
        let text = |name: &str| {
            values
                .get(name)
                .and_then(|v| v.as_text())
                .map(str::to_string)
                .ok_or_else(|| AppError::Internal(format!("{} draft is missing {}", kind, name)))
        };

        Ok(match kind {
            ContentKind::Announcement => KindFields::Announcement,
            ContentKind::Resource => KindFields::Resource {
                file_url: text("fileUrl")?,
                category: text("category")?,
            },
            ContentKind::Event => KindFields::Event {
                date: values
                    .get("date")
                    .and_then(|v| v.as_datetime())
                    .ok_or_else(|| AppError::Internal("event draft is missing date".to_string()))?,
                location: text("location")?,
                registration_limit: values
                    .get("registrationLimit")
                    .and_then(|v| v.as_count())
                    .unwrap_or(0),
            },
        })
    }

    /// Overwrite the fields present in `values`
    pub fn apply(&mut self, values: &FieldValues) {
        match self {
            KindFields::Announcement => {}
            KindFields::Resource { file_url, category } => {
                if let Some(v) = values.get("fileUrl").and_then(|v| v.as_text()) {
                    *file_url = v.to_string();
                }
                if let Some(v) = values.get("category").and_then(|v| v.as_text()) {
                    *category = v.to_string();
                }
            }
            KindFields::Event {
                date,
                location,
                registration_limit,
            } => {
                if let Some(v) = values.get("date").and_then(|v| v.as_datetime()) {
                    *date = v;
                }
                if let Some(v) = values.get("location").and_then(|v| v.as_text()) {
                    *location = v.to_string();
                }
                if let Some(v) = values.get("registrationLimit").and_then(|v| v.as_count()) {
                    *registration_limit = v;
                }
            }
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            KindFields::Announcement => ContentKind::Announcement,
            KindFields::Resource { .. } => ContentKind::Resource,
            KindFields::Event { .. } => ContentKind::Event,
        }
    }

    /// 0 means unlimited; always 0 for kinds without registration
    pub fn registration_limit(&self) -> u32 {
        match self {
            KindFields::Event {
                registration_limit, ..
            } => *registration_limit,
            _ => 0,
        }
    }

    pub fn event_date(&self) -> Option<DateTime<Utc>> {
        match self {
            KindFields::Event { date, .. } => Some(*date),
            _ => None,
        }
    }
}

/// A stored content item with every relation still as raw user ids
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: ItemId,
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: KindFields,
    /// Newest first
    pub comments: Vec<CommentRecord>,
    /// Insertion order, unique
    pub likes: Vec<UserId>,
    /// Insertion order, unique; empty for kinds without registration
    pub registered_users: Vec<UserId>,
}

impl ContentRecord {
    pub fn new(
        id: ItemId,
        kind: ContentKind,
        owner_id: UserId,
        values: &FieldValues,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let text = |name: &str| {
            values
                .get(name)
                .and_then(|v| v.as_text())
                .map(str::to_string)
                .ok_or_else(|| AppError::Internal(format!("{} draft is missing {}", kind, name)))
        };

        Ok(Self {
            id,
            kind,
            title: text("title")?,
            description: text("description")?,
            owner_id,
            created_at: now,
            updated_at: now,
            fields: KindFields::from_values(kind, values)?,
            comments: Vec::new(),
            likes: Vec::new(),
            registered_users: Vec::new(),
        })
    }

    /// Mutable fields after applying an update draft. Identity, ownership,
    /// creation time and the relation lists are never part of the result.
    pub fn updated_with(&self, values: &FieldValues, now: DateTime<Utc>) -> ItemUpdate {
        let mut fields = self.fields.clone();
        fields.apply(values);

        ItemUpdate {
            title: values
                .get("title")
                .and_then(|v| v.as_text())
                .map_or_else(|| self.title.clone(), str::to_string),
            description: values
                .get("description")
                .and_then(|v| v.as_text())
                .map_or_else(|| self.description.clone(), str::to_string),
            fields,
            updated_at: now,
        }
    }

    /// Every user id that populate has to resolve
    pub fn referenced_users(&self) -> Vec<UserId> {
        let mut ids = vec![self.owner_id];
        ids.extend(self.comments.iter().map(|c| c.author_id));
        ids.extend(self.likes.iter().copied());
        ids.extend(self.registered_users.iter().copied());
        ids
    }
}

/// The whitelisted mutable part of an item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub title: String,
    pub description: String,
    pub fields: KindFields,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ent_schema::FieldValue;

    fn event_values() -> FieldValues {
        let mut values = FieldValues::new();
        values.insert("title", FieldValue::Text("Hackathon".into()));
        values.insert("description", FieldValue::Text("48 hours".into()));
        values.insert(
            "date",
            FieldValue::DateTime(DateTime::from_timestamp_millis(1_750_000_000_000).unwrap()),
        );
        values.insert("location", FieldValue::Text("Lab 2".into()));
        values.insert("registrationLimit", FieldValue::Count(30));
        values
    }

    #[test]
    fn test_new_event_record() {
        let now = Utc::now();
        let record =
            ContentRecord::new(ItemId(1), ContentKind::Event, UserId(9), &event_values(), now)
                .unwrap();

        assert_eq!(record.owner_id, UserId(9));
        assert_eq!(record.fields.registration_limit(), 30);
        assert_eq!(record.fields.kind(), ContentKind::Event);
        assert!(record.comments.is_empty());
    }

    #[test]
    fn test_missing_field_is_internal_error() {
        let mut values = event_values();
        values.remove("location");
        let err = ContentRecord::new(ItemId(1), ContentKind::Event, UserId(9), &values, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_update_keeps_unlisted_fields() {
        let record = ContentRecord::new(
            ItemId(1),
            ContentKind::Event,
            UserId(9),
            &event_values(),
            Utc::now(),
        )
        .unwrap();

        let mut patch = FieldValues::new();
        patch.insert("location", FieldValue::Text("Auditorium".into()));
        let update = record.updated_with(&patch, Utc::now());

        assert_eq!(update.title, "Hackathon");
        assert_eq!(update.fields.registration_limit(), 30);
        assert!(matches!(
            update.fields,
            KindFields::Event { ref location, .. } if location == "Auditorium"
        ));
    }

    #[test]
    fn test_referenced_users_cover_all_relations() {
        let mut record = ContentRecord::new(
            ItemId(1),
            ContentKind::Event,
            UserId(1),
            &event_values(),
            Utc::now(),
        )
        .unwrap();
        record.comments.push(CommentRecord::new(
            crate::core::CommentId(5),
            UserId(2),
            "hi",
            Utc::now(),
        ));
        record.likes.push(UserId(3));
        record.registered_users.push(UserId(4));

        assert_eq!(
            record.referenced_users(),
            vec![UserId(1), UserId(2), UserId(3), UserId(4)]
        );
    }
}
