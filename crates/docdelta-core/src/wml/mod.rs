pub mod align;
pub mod atom;
mod comparer;
pub mod consolidate;
pub mod content;
pub mod decompose;
mod document;
pub mod dump;
mod markup;
pub mod moves;
pub mod project;
mod resources;
mod revision_processor;
mod revisions;
pub mod script;
mod settings;
pub mod units;
pub mod validate;

pub use comparer::{ComparisonResult, WmlComparer};
pub use consolidate::{
    consolidate, consolidate_with_settings, ConsolidationFailure, ConsolidationResult,
    ReviewerSummary, SuppressedChange,
};
pub use document::{find_document_body, DocumentSnapshot, NoteKind, NotesPart, PartKind, WmlDocument};
pub use revision_processor::{accept_revisions, reject_revisions};
pub use revisions::{get_revisions, Revision, RevisionKind};
pub use settings::{
    Rgb, WmlComparerConsolidateSettings, WmlComparerSettings, WmlRevisedDocumentInfo,
};
pub use validate::{validate_document, ValidationFinding};
