// Event schema: dated, located, with an optional registration cap

use crate::ent_schema::{
    Capabilities, ContentKind, ContentSchema, FieldDefinition, FieldType, FieldValue, SortOrder,
};

pub struct EventSchema;

impl ContentSchema for EventSchema {
    fn kind(&self) -> ContentKind {
        ContentKind::Event
    }

    fn own_fields(&self) -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("date", FieldType::DateTime, "Valid date is required"),
            FieldDefinition::new("location", FieldType::Text, "Location is required"),
            // 0 means unlimited
            FieldDefinition::new(
                "registrationLimit",
                FieldType::Count,
                "Registration limit must be a non-negative integer",
            )
            .optional()
            .default_value(FieldValue::Count(0)),
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_likes: false,
            has_registration: true,
        }
    }

    fn sort_order(&self) -> SortOrder {
        SortOrder::EventDateAsc
    }
}
