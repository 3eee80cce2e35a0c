//! Structural checks for produced documents.
//!
//! These cover the rules Word is strict about and that the projector has to
//! get right: property elements first, rows with cells, cells ending in a
//! paragraph, attributed revisions with unique ids and complete move ranges.
//! Findings are diagnostics; nothing is repaired.

use super::document::{NoteKind, WmlDocument};
use super::markup::REVISION_ELEMENTS;
use crate::error::Result;
use crate::xml::namespaces::W;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    pub part: String,
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.part, self.path, self.message)
    }
}

/// Elements whose properties child has to come first, and that child.
const PROPERTIES_FIRST: [(&str, &str); 5] = [
    ("p", "pPr"),
    ("r", "rPr"),
    ("tbl", "tblPr"),
    ("tc", "tcPr"),
    ("sdt", "sdtPr"),
];

/// Checks the main document and its notes parts.
pub fn validate_document(document: &WmlDocument) -> Result<Vec<ValidationFinding>> {
    let mut checker = Checker::default();
    let main_path = document.main_part().to_string();
    checker.part(&main_path, &document.main_document()?);
    for kind in NoteKind::ALL {
        if let Some(path) = document.notes_part(kind)? {
            checker.part(&path, &document.package().get_xml_part(&path)?);
        }
    }
    checker.moves();
    Ok(checker.findings)
}

#[derive(Default)]
struct Checker {
    findings: Vec<ValidationFinding>,
    /// Revision ids seen so far, across parts.
    ids: HashSet<String>,
    /// Move name -> (has source range, has destination range, first part)
    move_names: BTreeMap<String, (bool, bool, String)>,
}

impl Checker {
    fn report(&mut self, part: &str, doc: &XmlDocument, node: NodeId, message: impl Into<String>) {
        self.findings.push(ValidationFinding {
            part: part.to_string(),
            path: node_path(doc, node),
            message: message.into(),
        });
    }

    fn part(&mut self, part: &str, doc: &XmlDocument) {
        let Some(root) = doc.root() else {
            return;
        };
        // Open range starts per kind, by id.
        let mut open_ranges: BTreeMap<(String, String), NodeId> = BTreeMap::new();

        for node in doc.descendants(root) {
            let Some(local) = doc
                .name(node)
                .filter(|n| n.in_namespace(W::NS))
                .map(|n| n.local_name.clone())
            else {
                continue;
            };
            match local.as_str() {
                "body" => self.body(part, doc, node),
                "tr" => self.row(part, doc, node),
                "tc" => self.cell(part, doc, node),
                "t" if self.inside_removal(doc, node) => {
                    self.report(part, doc, node, "w:t inside removed content")
                }
                "delText" if !self.inside_removal(doc, node) => {
                    self.report(part, doc, node, "w:delText outside removed content")
                }
                _ => {}
            }
            if let Some(&(_, props)) = PROPERTIES_FIRST.iter().find(|(el, _)| *el == local) {
                self.properties_first(part, doc, node, props);
            }
            if REVISION_ELEMENTS.contains(local.as_str()) {
                self.revision(part, doc, node, &local, &mut open_ranges);
            }
        }

        for ((kind, id), node) in open_ranges {
            self.report(part, doc, node, format!("{} {} has no end", kind, id));
        }
    }

    fn body(&mut self, part: &str, doc: &XmlDocument, body: NodeId) {
        let children: Vec<NodeId> = doc.element_children(body).collect();
        for (i, &child) in children.iter().enumerate() {
            if doc.is_named(child, W::NS, "sectPr") && i + 1 != children.len() {
                self.report(part, doc, child, "body section properties are not last");
            }
        }
    }

    fn row(&mut self, part: &str, doc: &XmlDocument, row: NodeId) {
        let has_cell = doc.descendants(row).any(|n| doc.is_named(n, W::NS, "tc"));
        if !has_cell {
            self.report(part, doc, row, "row without cells");
        }
        let mut seen_content = false;
        for child in doc.element_children(row) {
            let is_props = doc.is_named(child, W::NS, "trPr") || doc.is_named(child, W::NS, "tblPrEx");
            if is_props && seen_content {
                self.report(part, doc, child, "row properties after cells");
            }
            seen_content |= !is_props;
        }
    }

    fn cell(&mut self, part: &str, doc: &XmlDocument, cell: NodeId) {
        let last = doc
            .element_children(cell)
            .filter(|&c| !doc.is_named(c, W::NS, "tcPr"))
            .last();
        match last {
            Some(last) if doc.is_named(last, W::NS, "p") => {}
            Some(last) if doc.is_named(last, W::NS, "sdt") || doc.is_named(last, W::NS, "customXml") => {}
            _ => self.report(part, doc, cell, "cell does not end with a paragraph"),
        }
    }

    fn properties_first(&mut self, part: &str, doc: &XmlDocument, node: NodeId, props: &str) {
        let misplaced = doc
            .element_children(node)
            .enumerate()
            .find(|&(i, c)| i > 0 && doc.is_named(c, W::NS, props));
        if let Some((_, child)) = misplaced {
            self.report(part, doc, child, format!("w:{} is not the first child", props));
        }
    }

    fn revision(
        &mut self,
        part: &str,
        doc: &XmlDocument,
        node: NodeId,
        local: &str,
        open_ranges: &mut BTreeMap<(String, String), NodeId>,
    ) {
        let id = doc.attribute(node, &W::id()).map(str::to_string);
        if let Some(kind) = local.strip_suffix("RangeEnd") {
            let key = (format!("{}Range", kind), id.unwrap_or_default());
            if open_ranges.remove(&key).is_none() {
                self.report(part, doc, node, format!("{} without a start", local));
            }
            return;
        }

        // A grid change carries no attribution of its own.
        if local != "tblGridChange" && doc.attribute(node, &W::author()).is_none() {
            self.report(part, doc, node, format!("w:{} without an author", local));
        }
        match id {
            None => self.report(part, doc, node, format!("w:{} without an id", local)),
            Some(id) => {
                if !self.ids.insert(id.clone()) {
                    self.report(part, doc, node, format!("revision id {} is used twice", id));
                }
                if let Some(kind) = local.strip_suffix("RangeStart") {
                    open_ranges.insert((format!("{}Range", kind), id), node);
                    let name = doc.attribute(node, &W::name()).unwrap_or_default().to_string();
                    let entry = self
                        .move_names
                        .entry(name)
                        .or_insert_with(|| (false, false, part.to_string()));
                    match kind {
                        "moveFrom" => entry.0 = true,
                        "moveTo" => entry.1 = true,
                        _ => {}
                    }
                }
            }
        }
    }

    fn moves(&mut self) {
        for (name, (from, to, part)) in &self.move_names {
            if from != to {
                self.findings.push(ValidationFinding {
                    part: part.clone(),
                    path: String::new(),
                    message: format!("move {} has only one side", name),
                });
            }
        }
    }

    fn inside_removal(&self, doc: &XmlDocument, node: NodeId) -> bool {
        doc.ancestors(node)
            .skip(1)
            .any(|a| doc.is_named(a, W::NS, "del") || doc.is_named(a, W::NS, "moveFrom"))
    }
}

/// `/document/body/p[2]/r[0]` style path of `node`.
fn node_path(doc: &XmlDocument, node: NodeId) -> String {
    let mut steps: Vec<String> = doc
        .ancestors(node)
        .filter_map(|n| {
            let name = doc.name(n)?;
            let step = match doc.parent(n) {
                Some(parent) => {
                    let index = doc
                        .element_children(parent)
                        .take_while(|&s| s != n)
                        .filter(|&s| doc.name(s) == Some(name))
                        .count();
                    format!("{}[{}]", name.local_name, index)
                }
                None => name.local_name.clone(),
            };
            Some(step)
        })
        .collect();
    steps.reverse();
    format!("/{}", steps.join("/"))
}
