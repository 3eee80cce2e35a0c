//! Revision reports.
//!
//! Both the projector (for the changes it creates) and [`get_revisions`]
//! (for any document's markup) feed a [`RevisionCollector`] one item per
//! changed piece of content; consecutive items with the same attribution
//! merge into one [`Revision`].

use super::content::ChangeKind;
use super::document::{find_document_body, NoteKind, PartKind, WmlDocument};
use super::settings::Rgb;
use crate::error::{CompareError, Result};
use crate::xml::namespaces::W;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Inserted,
    Deleted,
    MovedFrom,
    MovedTo,
    ParagraphInserted,
    ParagraphDeleted,
    RowInserted,
    RowDeleted,
    FormatChanged,
    ParagraphPropertiesChanged,
}

impl RevisionKind {
    pub fn of_change(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Inserted => RevisionKind::Inserted,
            ChangeKind::Deleted => RevisionKind::Deleted,
            ChangeKind::MovedFrom => RevisionKind::MovedFrom,
            ChangeKind::MovedTo => RevisionKind::MovedTo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Revision {
    pub kind: RevisionKind,
    pub author: String,
    pub date: Option<String>,
    pub text: String,
    /// Reviewer colour, for consolidated output only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_id: Option<u32>,
    pub part: PartKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RevisionItem {
    pub kind: RevisionKind,
    /// A paragraph mark rather than content.
    pub mark: bool,
    pub author: String,
    pub date: Option<String>,
    pub text: String,
    pub part: PartKind,
    pub move_id: Option<u32>,
    pub color: Option<Rgb>,
}

impl RevisionItem {
    fn same_group(&self, other: &RevisionItem) -> bool {
        self.kind == other.kind
            && self.author == other.author
            && self.date == other.date
            && self.part == other.part
            && self.move_id == other.move_id
            && self.color == other.color
    }
}

#[derive(Debug, Default)]
pub(crate) struct RevisionCollector {
    entries: Vec<Option<RevisionItem>>,
}

impl RevisionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: RevisionItem) {
        self.entries.push(Some(item));
    }

    /// Unchanged content between two changes.
    pub fn break_group(&mut self) {
        if !matches!(self.entries.last(), Some(None)) {
            self.entries.push(None);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Replaces everything pushed since `start` with one revision of `kind`.
    pub fn collapse_since(&mut self, start: usize, kind: RevisionKind) {
        let items: Vec<RevisionItem> = self.entries.drain(start..).flatten().collect();
        let Some(first) = items.first() else {
            return;
        };
        let text = items
            .iter()
            .filter(|i| !i.mark && !i.text.is_empty())
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let collapsed = RevisionItem {
            kind,
            mark: false,
            text,
            move_id: None,
            ..first.clone()
        };
        self.break_group();
        self.entries.push(Some(collapsed));
        self.break_group();
    }

    pub fn finish(self) -> Vec<Revision> {
        let mut out = Vec::new();
        let mut group: Option<(RevisionItem, bool, bool)> = None;

        let close = |group: Option<(RevisionItem, bool, bool)>, out: &mut Vec<Revision>| {
            let Some((item, has_content, _)) = group else {
                return;
            };
            let kind = match item.kind {
                RevisionKind::Inserted if !has_content => RevisionKind::ParagraphInserted,
                RevisionKind::Deleted if !has_content => RevisionKind::ParagraphDeleted,
                kind => kind,
            };
            out.push(Revision {
                kind,
                author: item.author,
                date: item.date,
                text: item.text,
                color: item.color,
                move_id: item.move_id,
                part: item.part,
            });
        };

        for entry in self.entries {
            let Some(item) = entry else {
                close(group.take(), &mut out);
                continue;
            };
            let joins = matches!(&group, Some((current, _, _)) if current.same_group(&item));
            if joins {
                if let Some((current, has_content, after_mark)) = group.as_mut() {
                    if item.mark {
                        *after_mark = true;
                    } else {
                        if *after_mark && *has_content {
                            current.text.push('\n');
                        }
                        current.text.push_str(&item.text);
                        *has_content = true;
                        *after_mark = false;
                    }
                }
                continue;
            }
            close(group.take(), &mut out);
            let has_content = !item.mark;
            let after_mark = item.mark;
            let item = if item.mark {
                RevisionItem { text: String::new(), ..item }
            } else {
                item
            };
            group = Some((item, has_content, after_mark));
        }
        close(group, &mut out);
        out
    }
}

/// Lists the tracked changes of any document, main part first, then
/// footnotes and endnotes.
pub fn get_revisions(document: &WmlDocument) -> Result<Vec<Revision>> {
    let mut collector = RevisionCollector::new();

    let main = document.main_document()?;
    let body = find_document_body(&main)
        .ok_or_else(|| CompareError::malformed(document.main_part(), "/document", "missing w:body"))?;
    MarkupWalker::new(&main, PartKind::Main, &mut collector).walk(body, None);

    for kind in NoteKind::ALL {
        if let Some(path) = document.notes_part(kind)? {
            let notes = document.package().get_xml_part(&path)?;
            if let Some(root) = notes.root() {
                MarkupWalker::new(&notes, kind.part(), &mut collector).walk(root, None);
            }
        }
    }
    Ok(collector.finish())
}

#[derive(Clone)]
struct Active {
    kind: ChangeKind,
    author: String,
    date: Option<String>,
    move_id: Option<u32>,
}

struct MarkupWalker<'d, 'c> {
    doc: &'d XmlDocument,
    part: PartKind,
    collector: &'c mut RevisionCollector,
    move_from: Option<u32>,
    move_to: Option<u32>,
}

impl<'d, 'c> MarkupWalker<'d, 'c> {
    fn new(doc: &'d XmlDocument, part: PartKind, collector: &'c mut RevisionCollector) -> Self {
        Self {
            doc,
            part,
            collector,
            move_from: None,
            move_to: None,
        }
    }

    fn item(&self, kind: RevisionKind, node: NodeId, mark: bool, text: String, move_id: Option<u32>) -> RevisionItem {
        RevisionItem {
            kind,
            mark,
            author: self.doc.attribute(node, &W::author()).unwrap_or_default().to_string(),
            date: self.doc.attribute(node, &W::date()).map(str::to_string),
            text,
            part: self.part,
            move_id,
            color: None,
        }
    }

    fn walk(&mut self, node: NodeId, active: Option<&Active>) {
        let doc = self.doc;
        for child in doc.element_children(node) {
            let Some(name) = doc.name(child) else {
                continue;
            };
            if !name.in_namespace(W::NS) {
                self.content(child, active, String::new());
                continue;
            }
            match name.local_name.as_str() {
                "moveFromRangeStart" => self.move_from = move_number(doc, child),
                "moveToRangeStart" => self.move_to = move_number(doc, child),
                "ins" | "del" | "moveFrom" | "moveTo" => {
                    let Some(kind) = ChangeKind::from_element(name) else {
                        continue;
                    };
                    let move_id = match kind {
                        ChangeKind::MovedFrom => self.move_from,
                        ChangeKind::MovedTo => self.move_to,
                        _ => None,
                    };
                    let inner = Active {
                        kind,
                        author: doc.attribute(child, &W::author()).unwrap_or_default().to_string(),
                        date: doc.attribute(child, &W::date()).map(str::to_string),
                        move_id,
                    };
                    self.walk(child, Some(&inner));
                }
                "p" => {
                    self.walk(child, active);
                    self.paragraph_mark(child);
                }
                "tr" => {
                    let start = self.collector.len();
                    self.walk(child, active);
                    if let Some((kind, marker)) = self.row_marker(child) {
                        if self.collector.len() == start {
                            let item = self.item(kind, marker, false, String::new(), None);
                            self.collector.push(item);
                        } else {
                            self.collector.collapse_since(start, kind);
                        }
                    }
                }
                "r" => self.run(child, active),
                "pPr" | "rPr" | "tblPr" | "trPr" | "tcPr" | "sectPr" | "sdtPr" | "tblGrid" => {}
                _ => self.walk(child, active),
            }
        }
    }

    fn run(&mut self, run: NodeId, active: Option<&Active>) {
        let doc = self.doc;
        let text: String = doc
            .element_children(run)
            .filter(|&c| !doc.is_named(c, W::NS, "rPr"))
            .map(|c| run_text(doc, c))
            .collect();

        if let Some(change) = doc
            .first_child_named(run, W::NS, "rPr")
            .and_then(|rpr| doc.first_child_named(rpr, W::NS, "rPrChange"))
        {
            let item = self.item(RevisionKind::FormatChanged, change, false, text.clone(), None);
            self.collector.push(item);
        }
        self.content(run, active, text);

        // Text box content inside the run's drawing; the first copy only,
        // fallback markup repeats it.
        if let Some(textbox) = doc.descendants(run).find(|&d| doc.is_named(d, W::NS, "txbxContent")) {
            self.walk(textbox, active);
        }
    }

    fn content(&mut self, _node: NodeId, active: Option<&Active>, text: String) {
        match active {
            Some(active) => self.collector.push(RevisionItem {
                kind: RevisionKind::of_change(active.kind),
                mark: false,
                author: active.author.clone(),
                date: active.date.clone(),
                text,
                part: self.part,
                move_id: active.move_id,
                color: None,
            }),
            None => self.collector.break_group(),
        }
    }

    fn paragraph_mark(&mut self, paragraph: NodeId) {
        let doc = self.doc;
        let Some(ppr) = doc.first_child_named(paragraph, W::NS, "pPr") else {
            self.collector.break_group();
            return;
        };
        if let Some(change) = doc.first_child_named(ppr, W::NS, "pPrChange") {
            let item = self.item(RevisionKind::ParagraphPropertiesChanged, change, false, String::new(), None);
            self.collector.push(item);
        }
        let marker = doc.first_child_named(ppr, W::NS, "rPr").and_then(|rpr| {
            doc.element_children(rpr)
                .filter_map(|m| doc.name(m).and_then(ChangeKind::from_element).map(|k| (k, m)))
                .last()
        });
        match marker {
            Some((kind, node)) => {
                let move_id = match kind {
                    ChangeKind::MovedFrom => self.move_from,
                    ChangeKind::MovedTo => self.move_to,
                    _ => None,
                };
                let item = self.item(RevisionKind::of_change(kind), node, true, String::new(), move_id);
                self.collector.push(item);
            }
            None => self.collector.break_group(),
        }
    }

    fn row_marker(&self, row: NodeId) -> Option<(RevisionKind, NodeId)> {
        let doc = self.doc;
        let trpr = doc.first_child_named(row, W::NS, "trPr")?;
        doc.element_children(trpr).find_map(|m| {
            if doc.is_named(m, W::NS, "del") {
                Some((RevisionKind::RowDeleted, m))
            } else if doc.is_named(m, W::NS, "ins") {
                Some((RevisionKind::RowInserted, m))
            } else {
                None
            }
        })
    }
}

fn run_text(doc: &XmlDocument, node: NodeId) -> String {
    let Some(name) = doc.name(node) else {
        return String::new();
    };
    if !name.in_namespace(W::NS) {
        return String::new();
    }
    match name.local_name.as_str() {
        "t" | "delText" => doc.text_content(node),
        "tab" | "ptab" => "\t".to_string(),
        "br" | "cr" => "\n".to_string(),
        _ => String::new(),
    }
}

/// `move3` -> 3
fn move_number(doc: &XmlDocument, node: NodeId) -> Option<u32> {
    doc.attribute(node, &W::name())?
        .strip_prefix("move")?
        .parse()
        .ok()
}
