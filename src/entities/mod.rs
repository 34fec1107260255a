// Portal entities - content records, comments, directory users and the
// populated views returned to callers

use chrono::{DateTime, Utc};

pub mod ent_comment;
pub mod ent_content;
pub mod ent_user;
pub mod populate;

pub use ent_comment::CommentRecord;
pub use ent_content::{ContentRecord, ItemUpdate, KindFields};
pub use ent_user::{LikeSummary, UserRecord, UserSummary};
pub use populate::{populate, populate_many, PopulatedComment, PopulatedItem};

/// Current time at the millisecond precision the store keeps
pub fn now_millis() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
