// Ent Framework - privacy rules shared by every content kind

pub mod ent_privacy;

pub use ent_privacy::{can_modify, PrivacyContext, PrivacyOperation, PrivacyPolicy, PrivacyResult, PrivacyRule};
