//! Accepting and rejecting tracked revisions.
//!
//! Both directions are one tree transform over the main, footnotes and
//! endnotes parts. Accepting keeps insertions and drops deletions; rejecting
//! does the opposite and restores the properties recorded in `*PrChange`
//! elements. A paragraph whose mark goes away joins the paragraph after it.

use super::content::ChangeKind;
use super::document::{NoteKind, WmlDocument};
use super::markup::as_restored;
use crate::error::{CompareError, Result};
use crate::xml::namespaces::W;
use crate::xml::{XmlDocument, XmlFragment};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Dropped in both directions.
static RANGE_MARKERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "moveFromRangeStart",
        "moveFromRangeEnd",
        "moveToRangeStart",
        "moveToRangeEnd",
        "customXmlInsRangeStart",
        "customXmlInsRangeEnd",
        "customXmlDelRangeStart",
        "customXmlDelRangeEnd",
        "customXmlMoveFromRangeStart",
        "customXmlMoveFromRangeEnd",
        "customXmlMoveToRangeStart",
        "customXmlMoveToRangeEnd",
        "cellIns",
        "cellDel",
        "cellMerge",
        "numberingChange",
    ]
    .into_iter()
    .collect()
});

/// Previous-property records, each inside the properties it describes.
static PROPERTY_CHANGES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "rPrChange",
        "pPrChange",
        "trPrChange",
        "tcPrChange",
        "tblPrChange",
        "tblPrExChange",
        "tblGridChange",
        "sectPrChange",
    ]
    .into_iter()
    .collect()
});

/// Containers whose last paragraph can't go away.
static NEEDS_PARAGRAPH: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["tc", "txbxContent", "footnote", "endnote"].into_iter().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accept,
    Reject,
}

impl Mode {
    /// Content marked with `kind` disappears in this direction.
    fn drops(self, kind: ChangeKind) -> bool {
        match self {
            Mode::Accept => kind.removes(),
            Mode::Reject => !kind.removes(),
        }
    }
}

/// Accepts every tracked change of `document`.
pub fn accept_revisions(document: &WmlDocument) -> Result<WmlDocument> {
    process_document(document, Mode::Accept)
}

/// Rejects every tracked change of `document`.
pub fn reject_revisions(document: &WmlDocument) -> Result<WmlDocument> {
    process_document(document, Mode::Reject)
}

fn process_document(document: &WmlDocument, mode: Mode) -> Result<WmlDocument> {
    let processor = Processor { mode };
    let mut output = document.clone();

    let main = processor.part(&document.main_document()?, document.main_part())?;
    let references = note_references(&main);
    output
        .package_mut()
        .put_xml_part(document.main_part(), &main)?;

    for kind in NoteKind::ALL {
        let Some(path) = document.notes_part(kind)? else {
            continue;
        };
        let mut notes = processor.part(&document.package().get_xml_part(&path)?, &path)?;
        let empty = HashSet::new();
        remove_orphans(&mut notes, kind, references.get(&kind).unwrap_or(&empty));
        output.package_mut().put_xml_part(&path, &notes)?;
    }

    debug!("{:?}ed revisions of {}", mode, document.main_part());
    Ok(output)
}

struct Processor {
    mode: Mode,
}

impl Processor {
    fn part(&self, doc: &XmlDocument, path: &str) -> Result<XmlDocument> {
        let root = doc
            .root()
            .ok_or_else(|| CompareError::malformed(path, "/", "empty part"))?;
        Ok(self.element(XmlFragment::extract(doc, root)).into_document())
    }

    /// What `fragment` becomes: nothing, its own content, or itself.
    fn process(&self, fragment: XmlFragment) -> Vec<XmlFragment> {
        let Some(name) = fragment.name() else {
            return vec![fragment];
        };
        if !name.in_namespace(W::NS) {
            return vec![self.element(fragment)];
        }
        let local = name.local_name.clone();
        if RANGE_MARKERS.contains(local.as_str()) || PROPERTY_CHANGES.contains(local.as_str()) {
            return Vec::new();
        }
        if let Some(kind) = ChangeKind::from_element(name) {
            if self.mode.drops(kind) {
                return Vec::new();
            }
            return self.children(fragment.children, &local);
        }
        match local.as_str() {
            "delText" | "delInstrText" if self.mode == Mode::Reject => {
                vec![self.element(as_restored(fragment))]
            }
            "tr" if self.marked_for_removal(&fragment, "trPr", &["ins", "del"]) => Vec::new(),
            "tc" if self.cell_removed(&fragment) => Vec::new(),
            "tr" => non_empty(self.element(fragment), &["tc", "sdt", "customXml"]),
            "tbl" => non_empty(self.element(fragment), &["tr", "sdt", "customXml"]),
            _ => vec![self.element(fragment)],
        }
    }

    /// `fragment` with its children processed.
    fn element(&self, mut fragment: XmlFragment) -> XmlFragment {
        if self.mode == Mode::Reject {
            restore_properties(&mut fragment);
        }
        let local = fragment
            .name()
            .filter(|n| n.in_namespace(W::NS))
            .map(|n| n.local_name.clone())
            .unwrap_or_default();
        let children = std::mem::take(&mut fragment.children);
        fragment.children = self.children(children, &local);
        fragment
    }

    fn children(&self, children: Vec<XmlFragment>, parent: &str) -> Vec<XmlFragment> {
        if children.iter().any(|c| c.is(W::NS, "p")) {
            return self.blocks(children, NEEDS_PARAGRAPH.contains(parent));
        }
        children.into_iter().flat_map(|c| self.process(c)).collect()
    }

    /// Block content, joining each paragraph that lost its mark to the
    /// paragraph after it.
    fn blocks(&self, children: Vec<XmlFragment>, needs_paragraph: bool) -> Vec<XmlFragment> {
        let mut out: Vec<XmlFragment> = Vec::new();
        let mut pending: Option<XmlFragment> = None;
        for child in children {
            if child.is(W::NS, "p") {
                let (mut paragraph, mark_removed) = self.paragraph(child);
                if let Some(previous) = pending.take() {
                    paragraph = join(previous, paragraph);
                }
                if mark_removed {
                    pending = Some(paragraph);
                } else {
                    out.push(paragraph);
                }
                continue;
            }
            let blocking = ["tbl", "sdt", "customXml", "sectPr"]
                .iter()
                .any(|name| child.is(W::NS, name));
            let processed = self.process(child);
            if blocking && !processed.is_empty() {
                if let Some(paragraph) = pending.take() {
                    if has_content(&paragraph) {
                        out.push(paragraph);
                    }
                }
            }
            out.extend(processed);
        }

        if let Some(paragraph) = pending {
            let ends_in_paragraph = out.last().is_some_and(|l| l.is(W::NS, "p"));
            if has_content(&paragraph) || (needs_paragraph && !ends_in_paragraph) {
                out.push(paragraph);
            }
        }
        out
    }

    fn paragraph(&self, paragraph: XmlFragment) -> (XmlFragment, bool) {
        let mark_removed = paragraph
            .child(W::NS, "pPr")
            .and_then(|ppr| ppr.child(W::NS, "rPr"))
            .is_some_and(|rpr| {
                rpr.element_children()
                    .filter_map(|m| m.name().and_then(ChangeKind::from_element))
                    .any(|kind| self.mode.drops(kind))
            });
        let mut paragraph = self.element(paragraph);
        if let Some(ppr) = paragraph.child_mut(W::NS, "pPr") {
            ppr.children
                .retain(|c| !(c.is(W::NS, "rPr") && c.children.is_empty()));
        }
        paragraph
            .children
            .retain(|c| !(c.is(W::NS, "pPr") && c.children.is_empty() && no_attributes(c)));
        (paragraph, mark_removed)
    }

    fn marked_for_removal(&self, fragment: &XmlFragment, properties: &str, markers: &[&str]) -> bool {
        fragment
            .child(W::NS, properties)
            .is_some_and(|props| {
                props.element_children().any(|m| {
                    markers.iter().any(|name| m.is(W::NS, name))
                        && m.name()
                            .and_then(ChangeKind::from_element)
                            .is_some_and(|kind| self.mode.drops(kind))
                })
            })
    }

    fn cell_removed(&self, cell: &XmlFragment) -> bool {
        let marker = match self.mode {
            Mode::Accept => "cellDel",
            Mode::Reject => "cellIns",
        };
        cell.child(W::NS, "tcPr")
            .is_some_and(|tcpr| tcpr.child(W::NS, marker).is_some())
    }
}

/// Replaces properties by the previous ones their change record holds.
/// Paragraph properties keep their mark formatting and section; section
/// properties keep their header and footer references.
fn restore_properties(properties: &mut XmlFragment) {
    let Some(at) = properties.children.iter().position(|c| {
        c.name()
            .is_some_and(|n| n.in_namespace(W::NS) && PROPERTY_CHANGES.contains(n.local_name.as_str()))
    }) else {
        return;
    };
    let change = properties.children.remove(at);
    let previous: Vec<XmlFragment> = change
        .children
        .into_iter()
        .find(|c| c.node.is_element())
        .map(|old| old.children)
        .unwrap_or_default();

    let is_paragraph = properties.is(W::NS, "pPr");
    let kept: Vec<XmlFragment> = std::mem::take(&mut properties.children)
        .into_iter()
        .filter(|c| {
            if is_paragraph {
                c.is(W::NS, "rPr") || c.is(W::NS, "sectPr")
            } else {
                c.is(W::NS, "headerReference") || c.is(W::NS, "footerReference")
            }
        })
        .collect();
    properties.children = if is_paragraph {
        previous.into_iter().chain(kept).collect()
    } else {
        kept.into_iter().chain(previous).collect()
    };
}

/// `next` with the content of `previous` in front; `next` keeps its
/// paragraph properties.
fn join(previous: XmlFragment, mut next: XmlFragment) -> XmlFragment {
    let content: Vec<XmlFragment> = previous
        .children
        .into_iter()
        .filter(|c| !c.is(W::NS, "pPr"))
        .collect();
    let at = usize::from(next.children.first().is_some_and(|c| c.is(W::NS, "pPr")));
    next.children.splice(at..at, content);
    next
}

/// `fragment` unless none of its children is one of `required`.
fn non_empty(fragment: XmlFragment, required: &[&str]) -> Vec<XmlFragment> {
    if fragment
        .children
        .iter()
        .any(|c| required.iter().any(|name| c.is(W::NS, name)))
    {
        vec![fragment]
    } else {
        Vec::new()
    }
}

fn has_content(paragraph: &XmlFragment) -> bool {
    paragraph.element_children().any(|c| {
        if c.is(W::NS, "pPr") {
            return false;
        }
        if c.is(W::NS, "r") {
            return c.element_children().any(|rc| !rc.is(W::NS, "rPr"));
        }
        true
    })
}

fn no_attributes(fragment: &XmlFragment) -> bool {
    fragment.node.attributes().map_or(true, |a| a.is_empty())
}

fn note_references(main: &XmlDocument) -> HashMap<NoteKind, HashSet<String>> {
    let mut references: HashMap<NoteKind, HashSet<String>> = HashMap::new();
    let Some(root) = main.root() else {
        return references;
    };
    for node in main.descendants(root) {
        let Some(kind) = main
            .name(node)
            .filter(|n| n.in_namespace(W::NS))
            .and_then(|n| NoteKind::from_reference(&n.local_name))
        else {
            continue;
        };
        if let Some(id) = main.attribute(node, &W::id()) {
            references.entry(kind).or_default().insert(id.to_string());
        }
    }
    references
}

/// Drops notes nothing refers to any more. Separator notes stay.
fn remove_orphans(notes: &mut XmlDocument, kind: NoteKind, referenced: &HashSet<String>) {
    let Some(root) = notes.root() else {
        return;
    };
    let orphans: Vec<_> = notes
        .element_children(root)
        .filter(|&n| notes.is_named(n, W::NS, kind.element()))
        .filter(|&n| {
            notes
                .attribute(n, &W::type_())
                .map_or(true, |t| t == "normal")
        })
        .filter(|&n| {
            notes
                .attribute(n, &W::id())
                .map_or(true, |id| !referenced.contains(id))
        })
        .collect();
    for note in orphans {
        notes.remove(note);
    }
}
