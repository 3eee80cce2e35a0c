//! End-to-end comparisons of in-memory documents.

mod common;

use common::{document, para, paras, settings, summary, table, with_footnotes};
use docdelta_core::wml::align::align;
use docdelta_core::wml::decompose::decompose;
use docdelta_core::wml::PartKind;
use docdelta_core::{
    get_revisions, validate_document, CompareError, RevisionKind, WmlComparer, WmlDocument,
};
use pretty_assertions::assert_eq;

fn compare(original: &WmlDocument, revised: &WmlDocument) -> docdelta_core::ComparisonResult {
    let result = WmlComparer::compare(original, revised, Some(&settings())).expect("compare");
    let findings = validate_document(&result.document).expect("validate");
    assert!(findings.is_empty(), "invalid output: {:#?}", findings);
    result
}

#[test]
fn replaced_word_is_one_deletion_and_one_insertion() {
    let result = compare(&paras(&["The quick brown fox"]), &paras(&["The quick red fox"]));
    assert_eq!(
        summary(&result.revisions),
        vec![
            (RevisionKind::Deleted, "brown".to_string()),
            (RevisionKind::Inserted, "red".to_string()),
        ]
    );
    assert!(result.revisions.iter().all(|r| r.author == "Reviewer"));

    let xml = result.document.main_xml().unwrap();
    assert_eq!(xml.matches("<w:p>").count() + xml.matches("<w:p ").count(), 1);
    assert!(xml.contains("<w:delText>brown</w:delText>"));
}

#[test]
fn deleted_row_is_a_single_row_revision() {
    let original = document(&table(&[&["a1", "a2"], &["b1", "b2"], &["c1", "c2"]]));
    let revised = document(&table(&[&["a1", "a2"], &["c1", "c2"]]));
    let result = compare(&original, &revised);

    assert_eq!(result.revisions.len(), 1, "{:#?}", result.revisions);
    assert_eq!(result.revisions[0].kind, RevisionKind::RowDeleted);
    assert!(result.revisions[0].text.contains("b1"));
    let xml = result.document.main_xml().unwrap();
    assert_eq!(xml.matches("<w:tr>").count() + xml.matches("<w:tr ").count(), 3);
}

#[test]
fn moved_paragraph_is_one_move_pair() {
    let lines = [
        "first paragraph stays right here",
        "this paragraph is going to move",
        "third paragraph keeps its place",
        "fourth paragraph keeps its place",
        "fifth paragraph keeps its place",
        "last paragraph stays right here",
    ];
    let moved = [lines[0], lines[2], lines[3], lines[4], lines[1], lines[5]];
    let result = compare(&paras(&lines), &paras(&moved));

    let kinds: Vec<RevisionKind> = result.revisions.iter().map(|r| r.kind).collect();
    assert!(kinds.contains(&RevisionKind::MovedFrom), "{:?}", kinds);
    assert!(kinds.contains(&RevisionKind::MovedTo), "{:?}", kinds);
    assert!(!kinds.contains(&RevisionKind::Deleted) && !kinds.contains(&RevisionKind::Inserted));

    let ids: Vec<Option<u32>> = result.revisions.iter().map(|r| r.move_id).collect();
    assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));
}

#[test]
fn self_compare_has_no_revisions() {
    let doc = document(&format!(
        "{}{}{}",
        para("Heading"),
        table(&[&["x", "y"], &["z", "w"]]),
        para("Closing words.")
    ));
    let result = compare(&doc, &doc);
    assert!(result.revisions.is_empty());
    assert!(get_revisions(&result.document).unwrap().is_empty());
}

#[test]
fn output_is_deterministic() {
    let (a, b) = (paras(&["one two three", "four"]), paras(&["one 2 three", "five"]));
    let first = compare(&a, &b).document.to_bytes().unwrap();
    let second = compare(&a, &b).document.to_bytes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn case_insensitive_comparison_ignores_case() {
    let (a, b) = (paras(&["The Fox"]), paras(&["the fox"]));
    assert!(!compare(&a, &b).revisions.is_empty());

    let folded = settings().with_case_insensitive(true);
    let result = WmlComparer::compare(&a, &b, Some(&folded)).unwrap();
    assert!(result.revisions.is_empty());
}

#[test]
fn detail_threshold_decides_between_words_and_whole_text() {
    let (a, b) = (
        paras(&["one two three four five six"]),
        paras(&["one two alpha beta gamma delta"]),
    );
    let deleted = |threshold: f64| -> Vec<String> {
        let config = settings().with_move_detection(false).with_detail_threshold(threshold);
        WmlComparer::compare(&a, &b, Some(&config))
            .unwrap()
            .revisions
            .into_iter()
            .filter(|r| r.kind == RevisionKind::Deleted)
            .map(|r| r.text)
            .collect()
    };

    let fine = deleted(0.15);
    assert!(!fine.is_empty());
    assert!(fine.iter().all(|text| !text.contains("one") && !text.contains("two")));
    assert!(fine.iter().any(|text| text.contains("three")));

    let coarse = deleted(0.5);
    assert!(coarse.iter().any(|text| text.contains("one two three")));
}

#[test]
fn mirrored_comparisons_swap_insertions_and_deletions() {
    let config = settings().with_move_detection(false);
    let (a, b) = (
        paras(&["alpha beta gamma", "delta"]),
        paras(&["alpha gamma epsilon", "delta zeta"]),
    );
    let (sa, sb) = (a.snapshot().unwrap(), b.snapshot().unwrap());
    let (la, lb) = (decompose(&sa, 0, &config).unwrap(), decompose(&sb, 1, &config).unwrap());
    let forward = align(&la, &lb, &config).unwrap().script.counts();

    let (ra, rb) = (decompose(&sb, 0, &config).unwrap(), decompose(&sa, 1, &config).unwrap());
    let backward = align(&ra, &rb, &config).unwrap().script.counts();

    assert_eq!(forward.equal, backward.equal);
    assert_eq!(forward.inserted, backward.deleted);
    assert_eq!(forward.deleted, backward.inserted);
}

#[test]
fn footnote_changes_are_reported_in_the_footnotes_part() {
    let result = compare(
        &with_footnotes("Body text", &["old note"]),
        &with_footnotes("Body text", &["new note"]),
    );
    assert_eq!(
        summary(&result.revisions),
        vec![
            (RevisionKind::Deleted, "old".to_string()),
            (RevisionKind::Inserted, "new".to_string()),
        ]
    );
    assert!(result.revisions.iter().all(|r| r.part == PartKind::Footnotes));
}

#[test]
fn packaged_output_reads_back() {
    let result = compare(&paras(&["keep this", "drop this"]), &paras(&["keep this"]));
    let reread = WmlDocument::from_bytes(&result.document.to_bytes().unwrap()).unwrap();
    assert_eq!(get_revisions(&reread).unwrap(), result.revisions);
}

#[test]
fn unsupported_content_is_a_typed_error() {
    let original = paras(&["text"]);
    let revised = document(r#"<w:altChunk r:id="rId9"/>"#);
    let err = WmlComparer::compare(&original, &revised, Some(&settings())).unwrap_err();
    assert!(matches!(err, CompareError::UnsupportedContent { .. }), "{}", err);
    assert!(err.is_content_error());
}

#[test]
fn table_without_rows_is_malformed() {
    let original = paras(&["text"]);
    let revised = document(r#"<w:tbl><w:tblPr/><w:tblGrid/></w:tbl><w:p/>"#);
    let err = WmlComparer::compare(&original, &revised, Some(&settings())).unwrap_err();
    assert!(matches!(err, CompareError::MalformedInput { .. }), "{}", err);
}
