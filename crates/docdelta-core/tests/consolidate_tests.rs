//! Consolidation of several reviewers into one document.

mod common;

use common::{document, paras, settings, table};
use docdelta_core::wml::consolidate_with_settings;
use docdelta_core::{
    consolidate, get_revisions, validate_document, Revision, RevisionKind, Rgb, WmlComparer,
    WmlComparerConsolidateSettings, WmlRevisedDocumentInfo,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const ANN: Rgb = Rgb(0xC0, 0x39, 0x2B);
const BOB: Rgb = Rgb(0x29, 0x80, 0xB9);
const CAY: Rgb = Rgb(0x27, 0xAE, 0x60);

fn key(r: &Revision) -> (RevisionKind, String, String) {
    (r.kind, r.author.clone(), r.text.clone())
}

#[test]
fn result_is_the_union_of_pairwise_comparisons() {
    let original = paras(&["one two three", "four five six", "seven eight nine"]);
    let reviewers = [
        ("Ann", ANN, paras(&["one 2 three", "four five six", "seven eight nine"])),
        ("Bob", BOB, paras(&["one two three", "four five", "seven eight nine"])),
        ("Cay", CAY, paras(&["one two three", "four five six", "seven eight nine ten"])),
    ];

    let mut expected = BTreeSet::new();
    for (name, _, doc) in &reviewers {
        let pairwise = WmlComparer::compare(&original, doc, Some(&settings().with_author(*name))).unwrap();
        expected.extend(pairwise.revisions.iter().map(|r| (format!("{:?}", r.kind), r.author.clone(), r.text.clone())));
    }

    let infos: Vec<_> = reviewers
        .iter()
        .map(|(name, color, doc)| WmlRevisedDocumentInfo::new(doc.clone(), *name, *color))
        .collect();
    let result = consolidate(&original, &infos, &settings()).unwrap();

    let actual: BTreeSet<_> = result
        .revisions
        .iter()
        .map(|r| (format!("{:?}", r.kind), r.author.clone(), r.text.clone()))
        .collect();
    assert_eq!(actual, expected);
    assert_eq!(result.revisions.len(), expected.len());

    for revision in &result.revisions {
        let info = infos.iter().find(|i| i.revisor == revision.author).unwrap();
        assert_eq!(revision.color, Some(info.color));
    }
    let counts: Vec<usize> = result.per_reviewer.iter().map(|s| s.revisions).collect();
    assert_eq!(counts.iter().sum::<usize>(), result.revisions.len());
    assert!(validate_document(&result.document).unwrap().is_empty());
}

#[test]
fn same_edit_from_two_reviewers_appears_once() {
    let original = paras(&["the draft title"]);
    let edit = || paras(&["the final title"]);
    let result = consolidate(
        &original,
        &[
            WmlRevisedDocumentInfo::new(edit(), "Ann", ANN),
            WmlRevisedDocumentInfo::new(edit(), "Bob", BOB),
        ],
        &settings(),
    )
    .unwrap();

    assert_eq!(
        result.revisions.iter().map(key).collect::<Vec<_>>(),
        vec![
            (RevisionKind::Deleted, "Ann".to_string(), "draft".to_string()),
            (RevisionKind::Inserted, "Ann".to_string(), "final".to_string()),
        ]
    );
    assert_eq!(result.suppressed.len(), 2);
    assert!(result.suppressed.iter().all(|s| s.revisor == "Bob"));
}

fn revision_set(revisions: &[Revision]) -> BTreeSet<(String, String, String)> {
    revisions
        .iter()
        .map(|r| (format!("{:?}", r.kind), r.author.clone(), r.text.clone()))
        .collect()
}

#[test]
fn overlapping_edits_do_not_depend_on_reviewer_order() {
    let original = paras(&["one two three four"]);
    let ann = || WmlRevisedDocumentInfo::new(paras(&["one four"]), "Ann", ANN);
    let bob = || WmlRevisedDocumentInfo::new(paras(&["one two 3 four"]), "Bob", BOB);

    let forward = consolidate(&original, &[ann(), bob()], &settings()).unwrap();
    let backward = consolidate(&original, &[bob(), ann()], &settings()).unwrap();
    assert_eq!(revision_set(&forward.revisions), revision_set(&backward.revisions));
    assert!(forward.suppressed.is_empty());
    assert!(backward.suppressed.is_empty());

    let found = revision_set(&forward.revisions);
    assert!(found.contains(&("Deleted".to_string(), "Bob".to_string(), "three".to_string())));
    assert!(found.contains(&("Inserted".to_string(), "Bob".to_string(), "3".to_string())));
    assert!(forward
        .revisions
        .iter()
        .any(|r| r.kind == RevisionKind::Deleted && r.author == "Ann" && r.text.contains("three")));
    assert!(validate_document(&forward.document).unwrap().is_empty());
}

#[test]
fn reviewer_colour_shades_their_changes() {
    let original = paras(&["one two three", "four five six"]);
    let result = consolidate(
        &original,
        &[
            WmlRevisedDocumentInfo::new(paras(&["one 2 three", "four five six"]), "Ann", ANN),
            WmlRevisedDocumentInfo::new(paras(&["one two three", "four 5 six"]), "Bob", BOB),
        ],
        &settings(),
    )
    .unwrap();

    let xml = result.document.main_xml().unwrap();
    assert!(xml.contains(r#"w:fill="C0392B""#));
    assert!(xml.contains(r#"w:fill="2980B9""#));
    assert!(xml.contains(">Ann</w:t>"));
    assert!(xml.contains(">Bob</w:t>"));
    assert!(validate_document(&result.document).unwrap().is_empty());
    assert_eq!(
        revision_set(&get_revisions(&result.document).unwrap()),
        revision_set(&result.revisions)
    );
}

#[test]
fn revisions_read_back_from_the_consolidated_document() {
    let original = document(&table(&[&["a", "b"], &["c", "d"]]));
    let edited = document(&table(&[&["a", "b2"], &["c", "d"]]));
    let result = consolidate(
        &original,
        &[WmlRevisedDocumentInfo::new(edited, "Ann", ANN)],
        &settings(),
    )
    .unwrap();

    let read: Vec<_> = get_revisions(&result.document).unwrap().iter().map(key).collect();
    assert_eq!(read, result.revisions.iter().map(key).collect::<Vec<_>>());
}

#[test]
fn a_broken_reviewer_does_not_stop_the_others() {
    let original = paras(&["alpha beta"]);
    let broken = document(r#"<w:tbl><w:tblPr/></w:tbl>"#);
    let infos = [
        WmlRevisedDocumentInfo::new(paras(&["alpha gamma"]), "Ann", ANN),
        WmlRevisedDocumentInfo::new(broken, "Bob", BOB),
    ];

    let result = consolidate(&original, &infos, &settings()).unwrap();
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].revisor, "Bob");
    assert!(result.failures[0].message.contains("table without rows"));
    assert!(!result.revisions.is_empty());

    let strict = WmlComparerConsolidateSettings {
        fail_fast: true,
        ..Default::default()
    };
    assert!(consolidate_with_settings(&original, &infos, &settings(), &strict).is_err());
}
