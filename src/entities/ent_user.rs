// EntUser - directory record and the display snapshots embedded on populate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Role, UserId};

/// A user as provisioned in the portal directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// `{id, name, email, role}` as embedded for owners, commenters and registrants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Likes only carry the display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeSummary {
    pub id: UserId,
    pub name: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<&UserRecord> for LikeSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}
