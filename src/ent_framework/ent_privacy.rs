// Ent Privacy System - Access control for content mutations
// Rules are evaluated by priority; the first Allow or Deny decides

use async_trait::async_trait;
use crate::{
    core::UserId,
    ent_schema::ContentKind,
    error::{AppError, AppResult},
    infrastructure::viewer::ViewerContext,
};

/// Privacy rule context for access control decisions
#[derive(Debug, Clone)]
pub struct PrivacyContext<'a> {
    pub kind: ContentKind,
    pub operation: PrivacyOperation,
    pub viewer: &'a ViewerContext,
    /// Owner of the target item; `None` for list/create
    pub owner_id: Option<UserId>,
}

/// Operations that can be controlled by privacy policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyOperation {
    Read,
    Create,
    Update,
    Delete,
    /// Comment, like, register or cancel on someone's item
    Interact,
}

/// Privacy rule result
#[derive(Debug, Clone, PartialEq)]
pub enum PrivacyResult {
    Allow,
    Deny(String),
    Skip,    // Skip this rule, continue to next
}

/// Trait for implementing privacy rules
#[async_trait]
pub trait PrivacyRule: Send + Sync {
    async fn evaluate(&self, ctx: &PrivacyContext<'_>) -> AppResult<PrivacyResult>;

    /// Get rule name for debugging
    fn name(&self) -> &str;

    fn operations(&self) -> Vec<PrivacyOperation>;

    /// Get rule priority (higher = evaluated first)
    fn priority(&self) -> i32;
}

/// The item's owner or an administrator may modify it
pub fn can_modify(owner_id: UserId, viewer: &ViewerContext) -> bool {
    viewer.user_id() == Some(owner_id) || viewer.is_admin()
}

/// Public access rule - anyone may read
pub struct PublicReadRule;

#[async_trait]
impl PrivacyRule for PublicReadRule {
    async fn evaluate(&self, ctx: &PrivacyContext<'_>) -> AppResult<PrivacyResult> {
        match ctx.operation {
            PrivacyOperation::Read => Ok(PrivacyResult::Allow),
            _ => Ok(PrivacyResult::Skip),
        }
    }

    fn name(&self) -> &str {
        "public_read"
    }

    fn operations(&self) -> Vec<PrivacyOperation> {
        vec![PrivacyOperation::Read]
    }

    fn priority(&self) -> i32 {
        100
    }
}

/// Every write needs a session. Creating and interacting need nothing more.
pub struct AuthenticatedRule;

#[async_trait]
impl PrivacyRule for AuthenticatedRule {
    async fn evaluate(&self, ctx: &PrivacyContext<'_>) -> AppResult<PrivacyResult> {
        match ctx.viewer.require_session() {
            Err(AppError::Unauthorized(msg)) => Ok(PrivacyResult::Deny(msg)),
            Err(other) => Err(other),
            Ok(_) => match ctx.operation {
                PrivacyOperation::Create | PrivacyOperation::Interact => Ok(PrivacyResult::Allow),
                _ => Ok(PrivacyResult::Skip),
            },
        }
    }

    fn name(&self) -> &str {
        "authenticated"
    }

    fn operations(&self) -> Vec<PrivacyOperation> {
        vec![
            PrivacyOperation::Create,
            PrivacyOperation::Update,
            PrivacyOperation::Delete,
            PrivacyOperation::Interact,
        ]
    }

    fn priority(&self) -> i32 {
        1000 // Highest priority
    }
}

/// Owner-or-admin rule - only the owner or an administrator can modify
pub struct OwnerOrAdminRule;

#[async_trait]
impl PrivacyRule for OwnerOrAdminRule {
    async fn evaluate(&self, ctx: &PrivacyContext<'_>) -> AppResult<PrivacyResult> {
        let verb = match ctx.operation {
            PrivacyOperation::Update => "update",
            PrivacyOperation::Delete => "delete",
            _ => return Ok(PrivacyResult::Skip),
        };

        match ctx.owner_id {
            Some(owner_id) if can_modify(owner_id, ctx.viewer) => Ok(PrivacyResult::Allow),
            _ => Ok(PrivacyResult::Deny(format!(
                "Not authorized to {} this {}",
                verb,
                ctx.kind.as_str()
            ))),
        }
    }

    fn name(&self) -> &str {
        "owner_or_admin"
    }

    fn operations(&self) -> Vec<PrivacyOperation> {
        vec![PrivacyOperation::Update, PrivacyOperation::Delete]
    }

    fn priority(&self) -> i32 {
        500
    }
}

/// Ordered rule set applied to every content kind
pub struct PrivacyPolicy {
    rules: Vec<Box<dyn PrivacyRule>>,
}

impl PrivacyPolicy {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn register_rule(&mut self, rule: Box<dyn PrivacyRule>) {
        self.rules.push(rule);
        // Sort by priority (highest first)
        self.rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub async fn evaluate(&self, ctx: &PrivacyContext<'_>) -> AppResult<PrivacyResult> {
        for rule in &self.rules {
            if !rule.operations().contains(&ctx.operation) {
                continue;
            }
            match rule.evaluate(ctx).await? {
                PrivacyResult::Skip => continue,
                decided => {
                    tracing::debug!(
                        "privacy rule {} decided {:?} for {:?} on {}",
                        rule.name(),
                        decided,
                        ctx.operation,
                        ctx.kind
                    );
                    return Ok(decided);
                }
            }
        }

        // Default to deny if no rules explicitly allow
        Ok(PrivacyResult::Deny("Not authorized".to_string()))
    }

    /// Evaluate and turn a denial into a 401
    pub async fn enforce(&self, ctx: &PrivacyContext<'_>) -> AppResult<()> {
        match self.evaluate(ctx).await? {
            PrivacyResult::Allow => Ok(()),
            PrivacyResult::Deny(msg) => Err(AppError::Unauthorized(msg)),
            PrivacyResult::Skip => Err(AppError::Unauthorized("Not authorized".to_string())),
        }
    }
}

impl Default for PrivacyPolicy {
    fn default() -> Self {
        let mut policy = PrivacyPolicy::new();
        policy.register_rule(Box::new(AuthenticatedRule));
        policy.register_rule(Box::new(OwnerOrAdminRule));
        policy.register_rule(Box::new(PublicReadRule));
        policy
    }
}
