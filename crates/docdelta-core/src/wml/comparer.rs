use super::align::align;
use super::consolidate::{consolidate_with_settings, ConsolidationResult};
use super::decompose::decompose;
use super::document::WmlDocument;
use super::dump::write_dumps;
use super::moves::detect_moves;
use super::project::{project, Attribution, ProjectionPlan, ProjectionSide};
use super::revision_processor;
use super::revisions::{self, Revision};
use super::settings::{WmlComparerConsolidateSettings, WmlComparerSettings, WmlRevisedDocumentInfo};
use crate::error::Result;
use log::debug;

/// A compared document and the revisions it now carries.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub document: WmlDocument,
    pub revisions: Vec<Revision>,
}

pub struct WmlComparer;

impl WmlComparer {
    /// Marks up `revised` with the changes that turn `original` into it.
    /// Neither input is modified.
    pub fn compare(
        original: &WmlDocument,
        revised: &WmlDocument,
        settings: Option<&WmlComparerSettings>,
    ) -> Result<ComparisonResult> {
        let settings = settings.cloned().unwrap_or_default();
        settings.validate()?;

        let left = original.snapshot()?;
        let right = revised.snapshot()?;
        let left_atoms = decompose(&left, 0, &settings)?;
        let right_atoms = decompose(&right, 1, &settings)?;

        let mut alignment = align(&left_atoms, &right_atoms, &settings)?;
        let moves = detect_moves(&mut alignment, &settings);
        debug!("script {:?}, {} moves", alignment.script.counts(), moves);

        if let Some(dir) = &settings.debug_output_dir {
            write_dumps(dir, &left_atoms, &right_atoms, &alignment, &settings)?;
        }

        let attribution = Attribution {
            author: revised.revision_author(&settings),
            date: revised.revision_date(&settings),
            color: None,
        };
        let plan = ProjectionPlan::for_comparison(&alignment.script, attribution);
        let sides = [
            ProjectionSide {
                atoms: &alignment.left,
                snapshot: &left,
            },
            ProjectionSide {
                atoms: &alignment.right,
                snapshot: &right,
            },
        ];
        let projection = project(&sides, &plan, &settings)?;
        debug!("compare produced {} revisions", projection.revisions.len());

        Ok(ComparisonResult {
            document: projection.document,
            revisions: projection.revisions,
        })
    }

    pub fn consolidate(
        original: &WmlDocument,
        revised: &[WmlRevisedDocumentInfo],
        settings: Option<&WmlComparerSettings>,
        consolidate_settings: Option<&WmlComparerConsolidateSettings>,
    ) -> Result<ConsolidationResult> {
        let settings = settings.cloned().unwrap_or_default();
        let consolidate_settings = consolidate_settings.cloned().unwrap_or_default();
        consolidate_with_settings(original, revised, &settings, &consolidate_settings)
    }

    pub fn accept_revisions(document: &WmlDocument) -> Result<WmlDocument> {
        revision_processor::accept_revisions(document)
    }

    pub fn reject_revisions(document: &WmlDocument) -> Result<WmlDocument> {
        revision_processor::reject_revisions(document)
    }

    /// Tracked changes of any document, in document order.
    pub fn get_revisions(document: &WmlDocument) -> Result<Vec<Revision>> {
        revisions::get_revisions(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompareError;
    use crate::xml::namespaces::W;

    fn doc(text: &str) -> WmlDocument {
        WmlDocument::from_main_xml(&format!(
            r#"<w:document xmlns:w="{}"><w:body><w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:body></w:document>"#,
            W::NS,
            text
        ))
        .unwrap()
    }

    #[test]
    fn explicit_author_and_date_are_used() {
        let settings = WmlComparerSettings::default()
            .with_author("Editor")
            .with_date_time("2024-01-02T03:04:05Z");
        let result = WmlComparer::compare(&doc("one two"), &doc("one three"), Some(&settings)).unwrap();
        assert!(!result.revisions.is_empty());
        assert!(result.revisions.iter().all(|r| r.author == "Editor"));
        assert!(result
            .revisions
            .iter()
            .all(|r| r.date.as_deref() == Some("2024-01-02T03:04:05Z")));
        assert_eq!(WmlComparer::get_revisions(&result.document).unwrap(), result.revisions);
    }

    #[test]
    fn invalid_settings_are_rejected_before_work() {
        let settings = WmlComparerSettings::default().with_detail_threshold(1.5);
        let err = WmlComparer::compare(&doc("a"), &doc("b"), Some(&settings)).unwrap_err();
        assert!(matches!(err, CompareError::InvalidSettings { .. }));
    }

    #[test]
    fn accept_and_reject_restore_each_side() {
        let (original, revised) = (doc("the quick brown fox"), doc("the slow brown dog"));
        let marked = WmlComparer::compare(&original, &revised, None).unwrap().document;

        let accepted = WmlComparer::accept_revisions(&marked).unwrap();
        let rejected = WmlComparer::reject_revisions(&marked).unwrap();
        assert!(WmlComparer::compare(&revised, &accepted, None).unwrap().revisions.is_empty());
        assert!(WmlComparer::compare(&original, &rejected, None).unwrap().revisions.is_empty());
    }
}
