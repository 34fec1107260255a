// Schema definitions module - one schema per content kind

pub mod announcement_schema;
pub mod event_schema;
pub mod resource_schema;

use crate::ent_schema::{ContentKind, ContentSchema};

pub use announcement_schema::AnnouncementSchema;
pub use event_schema::EventSchema;
pub use resource_schema::ResourceSchema;

/// Resolve the schema that configures a content kind
pub fn schema_for(kind: ContentKind) -> &'static dyn ContentSchema {
    match kind {
        ContentKind::Announcement => &AnnouncementSchema,
        ContentKind::Event => &EventSchema,
        ContentKind::Resource => &ResourceSchema,
    }
}
