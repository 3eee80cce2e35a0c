pub mod content_types;
pub mod ooxml;
pub mod relationships;

pub use content_types::{content_type_values, ContentTypes};
pub use ooxml::{CoreProperties, OoxmlPackage, CONTENT_TYPES_PART};
pub use relationships::{
    relationship_types, rels_path_for, relative_target, resolve_target, Relationship,
    Relationships, TargetMode,
};
