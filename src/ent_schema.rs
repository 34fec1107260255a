// Content Schema Framework - declarative description of each content kind
// Kinds differ only by configuration: wire names, capabilities, ordering and fields

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::FieldError;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid URL regex"));

/// The three content kinds served by the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Announcement,
    Event,
    Resource,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Announcement,
        ContentKind::Event,
        ContentKind::Resource,
    ];

    /// Storage discriminator
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Announcement => "announcement",
            ContentKind::Event => "event",
            ContentKind::Resource => "resource",
        }
    }

    /// Path segment under `/api`
    pub fn collection(self) -> &'static str {
        match self {
            ContentKind::Announcement => "announcements",
            ContentKind::Event => "events",
            ContentKind::Resource => "resources",
        }
    }

    /// Capitalised name used in response messages
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Announcement => "Announcement",
            ContentKind::Event => "Event",
            ContentKind::Resource => "Resource",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        ContentKind::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional behaviours a kind opts into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub has_likes: bool,
    pub has_registration: bool,
}

/// Default ordering of list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    CreatedDesc,
    EventDateAsc,
}

/// Schema definition trait - one implementation per content kind
pub trait ContentSchema: Send + Sync {
    fn kind(&self) -> ContentKind;

    /// Kind-specific fields, appended after title and description
    fn own_fields(&self) -> Vec<FieldDefinition>;

    fn capabilities(&self) -> Capabilities;

    /// Wire name of the owner reference
    fn owner_field(&self) -> &'static str {
        "createdBy"
    }

    fn sort_order(&self) -> SortOrder {
        SortOrder::CreatedDesc
    }

    /// Every mutable field; this is also the update whitelist
    fn fields(&self) -> Vec<FieldDefinition> {
        let mut fields = vec![
            FieldDefinition::new("title", FieldType::Text, "Title is required")
                .validate(FieldValidator::MaxLength(200)),
            FieldDefinition::new("description", FieldType::Text, "Description is required"),
        ];
        fields.extend(self.own_fields());
        fields
    }
}

/// Field definition used for validation and the update whitelist
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub field_type: FieldType,
    pub optional: bool,
    pub default: Option<FieldValue>,
    pub message: &'static str,
    pub validators: Vec<FieldValidator>,
}

impl FieldDefinition {
    pub fn new(name: &'static str, field_type: FieldType, message: &'static str) -> Self {
        Self {
            name,
            field_type,
            optional: false,
            default: None,
            message,
            validators: Vec::new(),
        }
    }

    /// Mark field as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Value used on create when the field is absent
    pub fn default_value(mut self, default: FieldValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Url,
    DateTime,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValidator {
    MaxLength(usize),
}

/// A validated, typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    DateTime(DateTime<Utc>),
    Count(u32),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u32> {
        match self {
            FieldValue::Count(n) => Some(*n),
            _ => None,
        }
    }
}

/// Validated values keyed by wire field name
pub type FieldValues = HashMap<&'static str, FieldValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftMode {
    /// Required fields must be present; defaults are filled in
    Create,
    /// Absent fields are left untouched
    Update,
}

/// Validate a request body against a kind's schema. All field errors are
/// collected; fields not named by the schema are ignored.
pub fn validate_draft(
    schema: &dyn ContentSchema,
    body: &Map<String, Value>,
    mode: DraftMode,
) -> Result<FieldValues, Vec<FieldError>> {
    let mut values = FieldValues::new();
    let mut errors = Vec::new();

    for field in schema.fields() {
        match body.get(field.name).filter(|v| !v.is_null()) {
            None => {
                if mode == DraftMode::Update {
                    continue;
                }
                if let Some(default) = &field.default {
                    values.insert(field.name, default.clone());
                } else if !field.optional {
                    errors.push(FieldError::body(field.name, field.message));
                }
            }
            Some(raw) => match parse_field(&field, raw) {
                Ok(value) => {
                    values.insert(field.name, value);
                }
                Err(msg) => errors.push(FieldError::body(field.name, msg)),
            },
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

fn parse_field(field: &FieldDefinition, raw: &Value) -> Result<FieldValue, String> {
    let value = match field.field_type {
        FieldType::Text => {
            // Stored as sent; blank means missing
            let text = raw
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| field.message.to_string())?;
            FieldValue::Text(text.to_string())
        }
        FieldType::Url => {
            let url = raw
                .as_str()
                .filter(|s| URL_PATTERN.is_match(s.trim()))
                .ok_or_else(|| field.message.to_string())?;
            FieldValue::Text(url.to_string())
        }
        FieldType::DateTime => {
            let parsed = raw
                .as_str()
                .and_then(|s| parse_datetime(s.trim()))
                .ok_or_else(|| field.message.to_string())?;
            FieldValue::DateTime(parsed)
        }
        FieldType::Count => {
            let count = match raw {
                Value::Number(n) => n.as_u64(),
                // HTML forms submit numbers as strings
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            let count = count
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| field.message.to_string())?;
            FieldValue::Count(count)
        }
    };

    for validator in &field.validators {
        match (validator, &value) {
            (FieldValidator::MaxLength(max), FieldValue::Text(s)) if s.chars().count() > *max => {
                return Err(format!("{} must be at most {} characters", field.name, max));
            }
            _ => {}
        }
    }

    Ok(value)
}

/// Accepts RFC 3339, `datetime-local` style timestamps (taken as UTC) and
/// bare dates (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
