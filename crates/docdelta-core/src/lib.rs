//! WordprocessingML comparison.
//!
//! [`WmlComparer::compare`] marks up a revised document with the tracked
//! changes that turn an original into it. The same engine consolidates
//! several reviewers' copies into one document and accepts or rejects
//! tracked changes.

pub mod error;
pub mod hash;
pub mod package;
pub mod util;
pub mod wml;
pub mod xml;

pub use error::{CompareError, Result};

pub use wml::{
    accept_revisions, consolidate, get_revisions, reject_revisions, validate_document,
    ComparisonResult, ConsolidationResult, Revision, RevisionKind, Rgb, ValidationFinding,
    WmlComparer, WmlComparerConsolidateSettings, WmlComparerSettings, WmlDocument,
    WmlRevisedDocumentInfo,
};
