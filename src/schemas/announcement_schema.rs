// Announcement schema: title and description only, likes enabled

use crate::ent_schema::{Capabilities, ContentKind, ContentSchema, FieldDefinition};

pub struct AnnouncementSchema;

impl ContentSchema for AnnouncementSchema {
    fn kind(&self) -> ContentKind {
        ContentKind::Announcement
    }

    fn own_fields(&self) -> Vec<FieldDefinition> {
        Vec::new()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_likes: true,
            has_registration: false,
        }
    }
}
