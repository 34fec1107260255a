// EntComment - a comment lives only inside its parent item

use chrono::{DateTime, Utc};

use crate::core::{CommentId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: CommentId,
    pub text: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl CommentRecord {
    pub fn new(id: CommentId, author_id: UserId, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            author_id,
            created_at: now,
        }
    }
}
