// Resource schema: a shared file link with a category

use crate::ent_schema::{
    Capabilities, ContentKind, ContentSchema, FieldDefinition, FieldType, FieldValidator,
};

pub struct ResourceSchema;

impl ContentSchema for ResourceSchema {
    fn kind(&self) -> ContentKind {
        ContentKind::Resource
    }

    fn own_fields(&self) -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("fileUrl", FieldType::Url, "Valid file URL is required")
                .validate(FieldValidator::MaxLength(2048)),
            FieldDefinition::new("category", FieldType::Text, "Category is required")
                .validate(FieldValidator::MaxLength(100)),
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_likes: true,
            has_registration: false,
        }
    }

    // Uploads are attributed to the uploader rather than a creator.
    fn owner_field(&self) -> &'static str {
        "uploadedBy"
    }
}
