//! Builders for in-memory test documents.

#![allow(dead_code)]

use docdelta_core::wml::NoteKind;
use docdelta_core::xml::namespaces::W;
use docdelta_core::{Revision, RevisionKind, WmlComparerSettings, WmlDocument};

pub const DATE: &str = "2024-05-01T00:00:00Z";

/// Routes `log` output through the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Settings with a fixed author and date so outputs are reproducible.
pub fn settings() -> WmlComparerSettings {
    init_logging();
    WmlComparerSettings::default()
        .with_author("Reviewer")
        .with_date_time(DATE)
}

pub fn document(body: &str) -> WmlDocument {
    WmlDocument::from_main_xml(&format!(
        r#"<w:document xmlns:w="{}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
        W::NS,
        body
    ))
    .expect("test document")
}

pub fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

pub fn paras(texts: &[&str]) -> WmlDocument {
    document(&texts.iter().map(|t| para(t)).collect::<String>())
}

pub fn table(rows: &[&[&str]]) -> String {
    let width = rows.iter().map(|cells| cells.len()).max().unwrap_or(0);
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|c| format!(r#"<w:tc><w:tcPr><w:tcW w:w="2000" w:type="dxa"/></w:tcPr>{}</w:tc>"#, para(c)))
                .collect();
            format!("<w:tr>{}</w:tr>", cells)
        })
        .collect();
    format!(
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>{}</w:tblGrid>{}</w:tbl>"#,
        r#"<w:gridCol w:w="2000"/>"#.repeat(width),
        rows
    )
}

/// A document whose paragraphs reference footnotes `1..=notes.len()`.
pub fn with_footnotes(text: &str, notes: &[&str]) -> WmlDocument {
    let references: String = (1..=notes.len())
        .map(|id| format!(r#"<w:r><w:footnoteReference w:id="{}"/></w:r>"#, id))
        .collect();
    let body = format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r>{}</w:p>"#,
        text, references
    );
    let footnotes: String = notes
        .iter()
        .enumerate()
        .map(|(i, note)| format!(r#"<w:footnote w:id="{}">{}</w:footnote>"#, i + 1, para(note)))
        .collect();
    let part = format!(
        r#"<w:footnotes xmlns:w="{}"><w:footnote w:type="separator" w:id="-1"><w:p><w:r><w:separator/></w:r></w:p></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p><w:r><w:continuationSeparator/></w:r></w:p></w:footnote>{}</w:footnotes>"#,
        W::NS,
        footnotes
    );
    document(&body)
        .with_notes_xml(NoteKind::Footnote, &part)
        .expect("footnotes part")
}

pub fn summary(revisions: &[Revision]) -> Vec<(RevisionKind, String)> {
    revisions.iter().map(|r| (r.kind, r.text.clone())).collect()
}

/// Text of every body paragraph, in order.
pub fn paragraph_texts(document: &WmlDocument) -> Vec<String> {
    let main = document.main_document().expect("main part");
    let Some(root) = main.root() else {
        return Vec::new();
    };
    main.descendants(root)
        .filter(|&n| main.is_named(n, W::NS, "p"))
        .map(|p| {
            main.descendants(p)
                .filter(|&t| main.is_named(t, W::NS, "t"))
                .map(|t| main.text_content(t))
                .collect()
        })
        .collect()
}
