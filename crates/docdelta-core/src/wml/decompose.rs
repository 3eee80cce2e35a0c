//! Structural atom decomposition.
//!
//! One generic walk over the closed node-kind set of [`super::content`]
//! turns a document into the flat, ordered atom list the aligner works on.
//! Text of adjacent runs that share properties, containers and existing
//! markup is joined before it is split into words, so run splits that carry
//! no formatting never change the atom sequence.

use super::atom::{
    content_hash, Ancestor, AtomContent, AtomSource, ComparisonAtom, ExistingRevision,
};
use super::content::{classify, ChangeKind, ContainerKind, Context, NodeKind};
use super::document::{DocumentSnapshot, NoteKind, PartKind};
use super::settings::WmlComparerSettings;
use crate::error::{CompareError, Result};
use crate::hash::sha256_hash_bytes;
use crate::package::resolve_target;
use crate::xml::namespaces::{preferred_prefix, R, V, W, W14};
use crate::xml::{XmlDocument, XmlFragment, XName};
use indextree::NodeId;
use log::debug;
use std::sync::Arc;

/// Decomposes one side of a comparison into atoms, in document order.
pub fn decompose(
    snapshot: &DocumentSnapshot<'_>,
    side: usize,
    settings: &WmlComparerSettings,
) -> Result<Vec<ComparisonAtom>> {
    let mut walker = Decomposer {
        snapshot,
        side,
        settings,
        atoms: Vec::new(),
        pending: None,
    };
    let frame = Frame {
        part: PartKind::Main,
        chain: Vec::new(),
        existing: Vec::new(),
        run_props: None,
    };
    walker.walk_children(snapshot.body, Context::Block, &frame, "/document/body")?;
    walker.flush_text();

    debug!(
        "decomposed side {} into {} atoms ({} paragraphs)",
        side,
        walker.atoms.len(),
        walker.atoms.iter().filter(|a| a.is_paragraph_mark()).count()
    );
    Ok(walker.atoms)
}

#[derive(Clone)]
struct Frame {
    part: PartKind,
    chain: Vec<Arc<Ancestor>>,
    existing: Vec<ExistingRevision>,
    run_props: Option<Arc<XmlFragment>>,
}

impl Frame {
    fn with_ancestor(&self, ancestor: Ancestor) -> Frame {
        let mut frame = self.clone();
        frame.chain.push(Arc::new(ancestor));
        frame
    }

    /// Text from two frames may be joined into one word.
    fn joins(&self, other: &Frame) -> bool {
        self.part == other.part
            && self.existing == other.existing
            && self.chain.len() == other.chain.len()
            && self.chain.iter().zip(&other.chain).all(|(a, b)| a.unid == b.unid)
            && match (&self.run_props, &other.run_props) {
                (None, None) => true,
                (Some(a), Some(b)) => a.canonical() == b.canonical(),
                _ => false,
            }
    }
}

struct PendingText {
    frame: Frame,
    text: String,
    /// Byte offset in `text` where each contributing `w:t` starts.
    starts: Vec<(usize, NodeId)>,
}

struct Decomposer<'s, 'a> {
    snapshot: &'s DocumentSnapshot<'a>,
    side: usize,
    settings: &'s WmlComparerSettings,
    atoms: Vec<ComparisonAtom>,
    pending: Option<PendingText>,
}

impl<'s, 'a> Decomposer<'s, 'a> {
    fn doc(&self, part: PartKind) -> Result<&'s XmlDocument> {
        self.snapshot.part(part).ok_or_else(|| CompareError::MissingPart {
            part_path: self.snapshot.part_path(part).to_string(),
            document_type: "Word".to_string(),
        })
    }

    fn part_path(&self, part: PartKind) -> &str {
        self.snapshot.part_path(part)
    }

    fn walk_children(&mut self, parent: NodeId, context: Context, frame: &Frame, path: &str) -> Result<()> {
        let doc = self.doc(frame.part)?;
        for (index, child) in doc.element_children(parent).enumerate() {
            let Some(name) = doc.name(child) else {
                continue;
            };
            let child_path = format!("{}/{}[{}]", path, name.local_name, index);
            match classify(name, context) {
                NodeKind::Container(kind, inner) => {
                    self.container(doc, child, kind, inner, frame, &child_path)?
                }
                NodeKind::Run => self.run(doc, child, frame, &child_path)?,
                NodeKind::Text => self.add_text(doc, child, frame),
                NodeKind::Leaf => self.leaf(doc, child, context, frame, &child_path)?,
                NodeKind::RevisionWrapper(kind) => {
                    let mut inner = frame.clone();
                    inner.existing.push(existing_revision(doc, child, kind));
                    self.walk_children(child, context, &inner, &child_path)?;
                }
                NodeKind::Properties | NodeKind::Ignorable => {}
                NodeKind::Unsupported => {
                    return Err(CompareError::unsupported(
                        self.part_path(frame.part),
                        qualified_name(name),
                        child_path,
                    ))
                }
            }
        }
        Ok(())
    }

    fn container(
        &mut self,
        doc: &XmlDocument,
        node: NodeId,
        kind: ContainerKind,
        inner: Context,
        frame: &Frame,
        path: &str,
    ) -> Result<()> {
        self.check_structure(doc, node, kind, frame.part, path)?;
        self.flush_text();

        let shell = container_shell(doc, node, kind);
        let inner_frame = frame.with_ancestor(Ancestor::new(self.side, frame.part, path, kind, shell));

        let content = match kind {
            ContainerKind::Sdt => doc.first_child_named(node, W::NS, "sdtContent"),
            _ => Some(node),
        };
        if let Some(content) = content {
            self.walk_children(content, inner, &inner_frame, path)?;
        }

        if kind == ContainerKind::Paragraph {
            self.paragraph_mark(doc, node, &inner_frame);
        }
        Ok(())
    }

    fn check_structure(
        &self,
        doc: &XmlDocument,
        node: NodeId,
        kind: ContainerKind,
        part: PartKind,
        path: &str,
    ) -> Result<()> {
        let has_child = |names: &[&str]| {
            doc.element_children(node)
                .any(|c| names.iter().any(|n| doc.is_named(c, W::NS, n)))
        };
        let problem = match kind {
            ContainerKind::Table if !has_child(&["tr", "sdt", "customXml"]) => Some("table without rows"),
            ContainerKind::Row if !has_child(&["tc", "sdt", "customXml"]) => Some("row without cells"),
            ContainerKind::Cell if !has_child(&["p", "sdt", "customXml"]) => {
                Some("cell without a paragraph")
            }
            _ => None,
        };
        match problem {
            Some(message) => Err(CompareError::malformed(self.part_path(part), path, message)),
            None => Ok(()),
        }
    }

    fn paragraph_mark(&mut self, doc: &XmlDocument, paragraph: NodeId, frame: &Frame) {
        self.flush_text();
        let mut existing = frame.existing.clone();
        let properties = doc.first_child_named(paragraph, W::NS, "pPr").map(|ppr| {
            let mut ppr = clean(XmlFragment::extract(doc, ppr));
            if let Some(rpr) = ppr.child_mut(W::NS, "rPr") {
                rpr.children.retain(|marker| {
                    let kind = marker.name().and_then(ChangeKind::from_element);
                    match kind {
                        Some(kind) => {
                            existing.push(fragment_revision(marker, kind));
                            false
                        }
                        None => true,
                    }
                });
            }
            Arc::new(ppr)
        });

        let content = AtomContent::ParagraphMark;
        self.atoms.push(ComparisonAtom {
            hash: content_hash(&content, self.settings),
            content,
            ancestors: frame.chain.clone(),
            source: AtomSource {
                side: self.side,
                part: frame.part,
                node: paragraph,
            },
            properties,
            element: None,
            in_run: false,
            existing,
        });
    }

    fn run(&mut self, doc: &XmlDocument, run: NodeId, frame: &Frame, path: &str) -> Result<()> {
        let mut inner = frame.clone();
        inner.run_props = doc
            .first_child_named(run, W::NS, "rPr")
            .map(|rpr| Arc::new(clean(XmlFragment::extract(doc, rpr))));
        self.walk_children(run, Context::Run, &inner, path)
    }

    fn add_text(&mut self, doc: &XmlDocument, node: NodeId, frame: &Frame) {
        let text = doc.text_content(node);
        if text.is_empty() {
            return;
        }
        if let Some(pending) = &mut self.pending {
            if pending.frame.joins(frame) {
                pending.starts.push((pending.text.len(), node));
                pending.text.push_str(&text);
                return;
            }
        }
        self.flush_text();
        self.pending = Some(PendingText {
            frame: frame.clone(),
            starts: vec![(0, node)],
            text,
        });
    }

    /// Splits pending text into word atoms and single-character separators.
    fn flush_text(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let node_at = |offset: usize| {
            pending
                .starts
                .iter()
                .rev()
                .find(|(start, _)| *start <= offset)
                .map(|(_, node)| *node)
                .unwrap_or(pending.starts[0].1)
        };

        let mut word_start: Option<usize> = None;
        let mut pieces: Vec<(usize, &str)> = Vec::new();
        for (offset, c) in pending.text.char_indices() {
            if self.settings.is_word_separator(c) {
                if let Some(start) = word_start.take() {
                    pieces.push((start, &pending.text[start..offset]));
                }
                pieces.push((offset, &pending.text[offset..offset + c.len_utf8()]));
            } else if word_start.is_none() {
                word_start = Some(offset);
            }
        }
        if let Some(start) = word_start {
            pieces.push((start, &pending.text[start..]));
        }

        for (offset, piece) in pieces {
            let content = AtomContent::Text(piece.to_string());
            self.atoms.push(ComparisonAtom {
                hash: content_hash(&content, self.settings),
                content,
                ancestors: pending.frame.chain.clone(),
                source: AtomSource {
                    side: self.side,
                    part: pending.frame.part,
                    node: node_at(offset),
                },
                properties: pending.frame.run_props.clone(),
                element: None,
                in_run: true,
                existing: pending.frame.existing.clone(),
            });
        }
    }

    /// Run objects, and foreign-namespace objects (math, alternate content)
    /// that sit directly in a paragraph.
    fn leaf(&mut self, doc: &XmlDocument, node: NodeId, context: Context, frame: &Frame, path: &str) -> Result<()> {
        let Some(name) = doc.name(node) else {
            return Ok(());
        };
        let in_run = context == Context::Run;
        self.flush_text();

        if name.in_namespace(W::NS) {
            if let Some(kind) = NoteKind::from_reference(&name.local_name) {
                return self.note_reference(doc, node, kind, frame, path);
            }
        }

        let textboxes = textbox_contents(doc, node);
        if in_run && textboxes.first().is_some_and(|&tb| doc.element_children(tb).next().is_some()) {
            return self.textbox(doc, node, &textboxes, frame, path);
        }

        let fragment = clean(XmlFragment::extract(doc, node));
        let (name, key, fragment) = self.element_identity(fragment, frame.part);
        self.push_element(
            AtomContent::Element { name, key },
            fragment,
            node,
            frame,
            in_run,
        );
        Ok(())
    }

    fn push_element(&mut self, content: AtomContent, fragment: XmlFragment, node: NodeId, frame: &Frame, in_run: bool) {
        self.atoms.push(ComparisonAtom {
            hash: content_hash(&content, self.settings),
            content,
            ancestors: frame.chain.clone(),
            source: AtomSource {
                side: self.side,
                part: frame.part,
                node,
            },
            properties: if in_run { frame.run_props.clone() } else { None },
            element: Some(Arc::new(fragment)),
            in_run,
            existing: frame.existing.clone(),
        });
    }

    /// Name and content key of an object, plus the fragment to keep for output.
    fn element_identity(&self, mut fragment: XmlFragment, part: PartKind) -> (String, String, XmlFragment) {
        let local = fragment.name().map(|n| n.local_name.clone()).unwrap_or_default();
        match local.as_str() {
            "instrText" | "delInstrText" => {
                fragment.node = crate::xml::XmlNodeData::element_with_attrs(
                    W::instrText(),
                    fragment.node.attributes().map(|a| a.to_vec()).unwrap_or_default(),
                );
                let key = fragment.text_content();
                ("instrText".to_string(), key, fragment)
            }
            _ => {
                let key = self.identity_fragment(&fragment, part).canonical();
                (local, key, fragment)
            }
        }
    }

    /// Drops per-document ids and replaces relationship ids by the content
    /// they point at, so the same image in two packages compares equal.
    fn identity_fragment(&self, fragment: &XmlFragment, part: PartKind) -> XmlFragment {
        let mut identity = fragment.clone();
        let source = self.part_path(part).to_string();
        let rels = self
            .snapshot
            .document
            .package()
            .relationships(&source)
            .unwrap_or_default();
        let package = self.snapshot.document.package();

        identity.walk_mut(&mut |el| {
            let Some(name) = el.name().cloned() else {
                return;
            };
            let Some(attrs) = el.node.attributes_mut() else {
                return;
            };
            attrs.retain(|a| {
                let local = a.name.local_name.as_str();
                let per_document = (matches!(name.local_name.as_str(), "docPr" | "cNvPr")
                    && a.name.namespace.is_none()
                    && (local == "id" || local == "name"))
                    || a.name.in_namespace(W14::NS)
                    || (name.in_namespace(V::NS) && a.name.namespace.is_none() && local == "id")
                    || a.name.local_name == "spid";
                !per_document
            });
            for attr in attrs.iter_mut() {
                if !attr.name.in_namespace(R::NS) {
                    continue;
                }
                attr.value = match rels.get(&attr.value) {
                    Some(rel) if rel.is_external() => format!("external:{}", rel.target),
                    Some(rel) => {
                        let target = resolve_target(&source, &rel.target);
                        package
                            .get_part(&target)
                            .map(sha256_hash_bytes)
                            .unwrap_or(target)
                    }
                    None => format!("unresolved:{}", attr.value),
                };
            }
        });
        identity
    }

    fn note_reference(
        &mut self,
        doc: &XmlDocument,
        node: NodeId,
        kind: NoteKind,
        frame: &Frame,
        path: &str,
    ) -> Result<()> {
        let id = doc.attribute(node, &W::id()).unwrap_or_default().to_string();
        let notes = self.snapshot.notes(kind).ok_or_else(|| {
            CompareError::malformed(
                self.part_path(frame.part),
                path,
                format!("{} without a {} part", kind.reference(), kind.root_element()),
            )
        })?;
        let note = notes.note(&id).ok_or_else(|| {
            CompareError::malformed(
                self.part_path(frame.part),
                path,
                format!("reference to missing {} {}", kind.element(), id),
            )
        })?;

        let note_path = format!("/{}/{}[id={}]", kind.root_element(), kind.element(), id);
        let mut shell = XmlFragment::element(XName::new(W::NS, kind.element()));
        if let Some(attrs) = notes.xml.get(note).and_then(|d| d.attributes()) {
            for attr in attrs.iter().filter(|a| a.name != W::id()) {
                shell.set_attribute(attr.name.clone(), &attr.value);
            }
        }
        let ancestor = Ancestor::new(self.side, kind.part(), &note_path, ContainerKind::Note(kind), shell);

        let fragment = clean(XmlFragment::extract(doc, node));
        self.push_element(
            AtomContent::NoteReference {
                kind,
                note: ancestor.unid.clone(),
            },
            fragment,
            node,
            frame,
            true,
        );

        let note_frame = Frame {
            part: kind.part(),
            chain: frame.chain.clone(),
            existing: Vec::new(),
            run_props: None,
        }
        .with_ancestor(ancestor);
        self.walk_children(note, Context::Block, &note_frame, &note_path)?;
        self.flush_text();
        Ok(())
    }

    /// A run object holding text box content becomes a container; the run
    /// with its object (text box content emptied) is the shell.
    fn textbox(
        &mut self,
        doc: &XmlDocument,
        node: NodeId,
        textboxes: &[NodeId],
        frame: &Frame,
        path: &str,
    ) -> Result<()> {
        let mut object = clean(XmlFragment::extract(doc, node));
        object.walk_mut(&mut |el| {
            if el.is(W::NS, "txbxContent") {
                el.children.clear();
            }
        });
        let mut shell = XmlFragment::element(W::r());
        if let Some(rpr) = &frame.run_props {
            shell.children.push((**rpr).clone());
        }
        shell.children.push(object);

        let mut inner = frame.with_ancestor(Ancestor::new(
            self.side,
            frame.part,
            path,
            ContainerKind::TextBox,
            shell,
        ));
        inner.run_props = None;
        self.walk_children(textboxes[0], Context::Block, &inner, &format!("{}/txbxContent", path))?;
        self.flush_text();
        Ok(())
    }
}

fn existing_revision(doc: &XmlDocument, node: NodeId, kind: ChangeKind) -> ExistingRevision {
    ExistingRevision {
        kind: settle_move(kind),
        author: doc.attribute(node, &W::author()).unwrap_or_default().to_string(),
        date: doc.attribute(node, &W::date()).map(str::to_string),
    }
}

fn fragment_revision(marker: &XmlFragment, kind: ChangeKind) -> ExistingRevision {
    ExistingRevision {
        kind: settle_move(kind),
        author: marker.attribute(&W::author()).unwrap_or_default().to_string(),
        date: marker.attribute(&W::date()).map(str::to_string),
    }
}

/// Pre-existing moves lose their range pairing once content is re-laid out,
/// so they are carried as the deletion/insertion they accept and reject as.
fn settle_move(kind: ChangeKind) -> ChangeKind {
    match kind {
        ChangeKind::MovedFrom => ChangeKind::Deleted,
        ChangeKind::MovedTo => ChangeKind::Inserted,
        other => other,
    }
}

/// The container element with its property children but no content.
fn container_shell(doc: &XmlDocument, node: NodeId, kind: ContainerKind) -> XmlFragment {
    let mut shell = XmlFragment::extract(doc, node);
    shell.children.clear();
    if kind != ContainerKind::Paragraph {
        for child in doc.element_children(node) {
            let is_properties = doc
                .name(child)
                .is_some_and(|n| classify(n, Context::Block) == NodeKind::Properties);
            if is_properties && !doc.is_named(child, W::NS, "sectPr") {
                shell.children.push(XmlFragment::extract(doc, child));
            }
        }
    }
    clean(shell)
}

/// `w:txbxContent` elements under `node`, outermost only.
fn textbox_contents(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    doc.descendants(node)
        .filter(|&d| doc.is_named(d, W::NS, "txbxContent"))
        .filter(|&d| {
            !doc.ancestors(d)
                .skip(1)
                .take_while(|&a| a != node)
                .any(|a| doc.is_named(a, W::NS, "txbxContent"))
        })
        .collect()
}

/// Strips revision-session ids that differ between otherwise identical documents.
pub(crate) fn clean(mut fragment: XmlFragment) -> XmlFragment {
    fragment.walk_mut(&mut |el| {
        if let Some(attrs) = el.node.attributes_mut() {
            attrs.retain(|a| {
                let rsid = a.name.in_namespace(W::NS) && a.name.local_name.starts_with("rsid");
                let para_id = a.name.in_namespace(W14::NS)
                    && matches!(a.name.local_name.as_str(), "paraId" | "textId");
                !(rsid || para_id)
            });
        }
    });
    fragment
}

fn qualified_name(name: &XName) -> String {
    match name.namespace.as_deref() {
        Some(ns) => format!("{}:{}", preferred_prefix(ns), name.local_name),
        None => name.local_name.clone(),
    }
}
