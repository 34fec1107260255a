use chrono::{DateTime, Utc};

use crate::core::{Role, UserId};
use crate::error::{AppError, AppResult};

/// A validated bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub user_id: UserId,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    /// No usable credentials. `token_rejected` is set when a token was sent
    /// but failed validation.
    Anonymous { token_rejected: bool },
    User(Session),
}

/// Request-scoped identity handed to every operation
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    pub viewer: Viewer,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            request_id,
            viewer: Viewer::Anonymous { token_rejected: false },
        }
    }

    pub fn rejected(request_id: String) -> Self {
        ViewerContext {
            request_id,
            viewer: Viewer::Anonymous { token_rejected: true },
        }
    }

    pub fn authenticated(request_id: String, session: Session) -> Self {
        ViewerContext {
            request_id,
            viewer: Viewer::User(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.viewer {
            Viewer::User(session) => Some(session),
            Viewer::Anonymous { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.session().map(|s| s.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.session().map_or(false, |s| s.role.is_admin())
    }

    /// The session, or the 401 an anonymous caller gets on protected routes
    pub fn require_session(&self) -> AppResult<&Session> {
        match &self.viewer {
            Viewer::User(session) => Ok(session),
            Viewer::Anonymous { token_rejected: true } => {
                Err(AppError::Unauthorized("Token is not valid".to_string()))
            }
            Viewer::Anonymous { token_rejected: false } => {
                Err(AppError::Unauthorized("No token, authorization denied".to_string()))
            }
        }
    }
}
