//! Accepting a comparison gives back the revised document; rejecting it
//! gives back the original.

mod common;

use common::{document, para, paragraph_texts, paras, settings, table, with_footnotes};
use docdelta_core::{accept_revisions, reject_revisions, validate_document, WmlComparer, WmlDocument};
use pretty_assertions::assert_eq;

fn revisions_between(a: &WmlDocument, b: &WmlDocument) -> usize {
    WmlComparer::compare(a, b, Some(&settings()))
        .expect("compare")
        .revisions
        .len()
}

fn assert_round_trips(name: &str, original: &WmlDocument, revised: &WmlDocument) {
    let marked = WmlComparer::compare(original, revised, Some(&settings()))
        .unwrap_or_else(|e| panic!("{}: {}", name, e))
        .document;

    let accepted = accept_revisions(&marked).unwrap();
    assert_eq!(revisions_between(revised, &accepted), 0, "{}: accept", name);
    assert!(validate_document(&accepted).unwrap().is_empty(), "{}: accepted output", name);

    let rejected = reject_revisions(&marked).unwrap();
    assert_eq!(revisions_between(original, &rejected), 0, "{}: reject", name);
    assert!(validate_document(&rejected).unwrap().is_empty(), "{}: rejected output", name);
}

#[test]
fn word_replacement() {
    assert_round_trips(
        "word",
        &paras(&["The quick brown fox"]),
        &paras(&["The quick red fox"]),
    );
}

#[test]
fn paragraph_inserted_and_deleted() {
    let short = paras(&["first line here", "last line here"]);
    let long = paras(&["first line here", "a brand new middle", "last line here"]);
    assert_round_trips("insert", &short, &long);
    assert_round_trips("delete", &long, &short);
}

#[test]
fn paragraph_split_and_joined() {
    let joined = paras(&["alpha beta gamma delta"]);
    let split = paras(&["alpha beta", "gamma delta"]);
    assert_round_trips("split", &joined, &split);
    assert_round_trips("join", &split, &joined);
}

#[test]
fn trailing_paragraph_changes() {
    assert_round_trips("append", &paras(&["only"]), &paras(&["only", "appended text"]));
    assert_round_trips("truncate", &paras(&["only", "removed text"]), &paras(&["only"]));
}

#[test]
fn table_rows_and_cells() {
    let three = document(&format!("{}{}", table(&[&["a", "b"], &["c", "d"], &["e", "f"]]), para("")));
    let two = document(&format!("{}{}", table(&[&["a", "b"], &["e", "f"]]), para("")));
    let edited = document(&format!("{}{}", table(&[&["a", "b"], &["c", "changed"], &["e", "f"]]), para("")));
    assert_round_trips("row delete", &three, &two);
    assert_round_trips("row insert", &two, &three);
    assert_round_trips("cell edit", &three, &edited);
}

#[test]
fn moved_paragraph() {
    let before = paras(&[
        "opening words stay put",
        "these words will be moved",
        "middle words stay put",
        "closing words stay put",
    ]);
    let after = paras(&[
        "opening words stay put",
        "middle words stay put",
        "these words will be moved",
        "closing words stay put",
    ]);
    assert_round_trips("move", &before, &after);
}

#[test]
fn footnote_text() {
    assert_round_trips(
        "footnote",
        &with_footnotes("Body", &["the old note"]),
        &with_footnotes("Body", &["the new note"]),
    );
}

#[test]
fn run_and_paragraph_formatting() {
    let plain = document(r#"<w:p><w:r><w:t xml:space="preserve">make this </w:t></w:r><w:r><w:t>bold</w:t></w:r></w:p>"#);
    let bold = document(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t xml:space="preserve">make this </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r></w:p>"#,
    );
    assert_round_trips("formatting", &plain, &bold);
}

#[test]
fn accepted_text_matches_revised_paragraphs() {
    let original = paras(&["keep", "drop me", "edit this line"]);
    let revised = paras(&["keep", "edit that line", "added"]);
    let marked = WmlComparer::compare(&original, &revised, Some(&settings())).unwrap().document;

    assert_eq!(
        paragraph_texts(&accept_revisions(&marked).unwrap()),
        paragraph_texts(&revised)
    );
    assert_eq!(
        paragraph_texts(&reject_revisions(&marked).unwrap()),
        paragraph_texts(&original)
    );
}
