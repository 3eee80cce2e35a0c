//! Revision projection.
//!
//! The projector rebuilds one WordprocessingML document from an annotated
//! atom stream. Every stream entry names an atom of some input side and the
//! revision status it has in the output. Containers of matched atoms are
//! unified first, so an equal word and the deleted word next to it end up
//! in the same output paragraph. The stream is then grouped level by level
//! by container identity, and each group is re-assembled around the shell
//! of its container.
//!
//! Comparison and consolidation both end here: a comparison projects the
//! edit script of two sides, a consolidation projects the merged changes of
//! several reviewers over the original.

use super::atom::{Ancestor, AtomContent, ComparisonAtom};
use super::content::{ChangeKind, ContainerKind};
use super::document::{DocumentSnapshot, NoteKind, PartKind, WmlDocument};
use super::markup::{
    add_mark_markers, add_paragraph_change, add_row_marker, as_removed, move_range,
    paragraph_format_signature, renumber, revision_element, run_properties_with_change,
    text_element, RevisionIds, Stamp,
};
use super::resources::Relocator;
use super::revisions::{Revision, RevisionCollector, RevisionItem, RevisionKind};
use super::script::{EditScript, ScriptEntry};
use super::settings::{Rgb, WmlComparerSettings};
use crate::error::{CompareError, Result};
use crate::util::{group_adjacent, split_after};
use crate::xml::namespaces::W;
use crate::xml::{XName, XmlFragment, XmlNodeData};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// One input of a projection.
pub struct ProjectionSide<'a> {
    pub atoms: &'a [ComparisonAtom],
    pub snapshot: &'a DocumentSnapshot<'a>,
}

/// Who a new revision is attributed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub author: String,
    pub date: String,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Equal,
    Inserted,
    Deleted,
    MovedFrom(u32),
    MovedTo(u32),
}

impl Status {
    /// The tracked change this status produces, with its move id.
    pub fn change(self) -> Option<(ChangeKind, Option<u32>)> {
        match self {
            Status::Equal => None,
            Status::Inserted => Some((ChangeKind::Inserted, None)),
            Status::Deleted => Some((ChangeKind::Deleted, None)),
            Status::MovedFrom(id) => Some((ChangeKind::MovedFrom, Some(id))),
            Status::MovedTo(id) => Some((ChangeKind::MovedTo, Some(id))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutAtom {
    pub side: usize,
    pub index: usize,
    pub status: Status,
    /// Index into [`ProjectionPlan::attributions`].
    pub attribution: usize,
    /// The atom an equal entry was matched with.
    pub other: Option<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub stream: Vec<OutAtom>,
    /// Container unids matched by the aligner.
    pub container_pairs: Vec<(String, String)>,
    /// Further matched atom pairs, used only to unify containers.
    pub links: Vec<((usize, usize), (usize, usize))>,
    /// The side whose package and container shells the output starts from.
    pub base_side: usize,
    pub attributions: Vec<Attribution>,
}

impl ProjectionPlan {
    /// Plan for a two-sided comparison: the revised side (1) is the base,
    /// equal atoms are emitted from it.
    pub fn for_comparison(script: &EditScript, attribution: Attribution) -> Self {
        let stream = script
            .entries
            .iter()
            .map(|entry| {
                let (side, index, status, other) = match *entry {
                    ScriptEntry::Equal { left, right } => (1, right, Status::Equal, Some((0, left))),
                    ScriptEntry::Inserted { right } => (1, right, Status::Inserted, None),
                    ScriptEntry::Deleted { left } => (0, left, Status::Deleted, None),
                    ScriptEntry::MovedFrom { left, move_id } => (0, left, Status::MovedFrom(move_id), None),
                    ScriptEntry::MovedTo { right, move_id } => (1, right, Status::MovedTo(move_id), None),
                };
                OutAtom {
                    side,
                    index,
                    status,
                    attribution: 0,
                    other,
                }
            })
            .collect();
        Self {
            stream,
            container_pairs: script.container_pairs.clone(),
            links: Vec::new(),
            base_side: 1,
            attributions: vec![attribution],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub document: WmlDocument,
    pub revisions: Vec<Revision>,
}

/// Rebuilds a document from `plan`.
pub fn project(
    sides: &[ProjectionSide<'_>],
    plan: &ProjectionPlan,
    settings: &WmlComparerSettings,
) -> Result<Projection> {
    check_plan(sides, plan)?;
    let base = &sides[plan.base_side];

    let identity = Identity::build(sides, plan);

    // Note content is built into its own part, with chains starting inside
    // the note.
    let mut main_items: Vec<Item> = Vec::new();
    let mut notes: Vec<NoteGroup> = Vec::new();
    for out in &plan.stream {
        let mut chain: Vec<Arc<Ancestor>> = sides[out.side].atoms[out.index]
            .ancestors
            .iter()
            .map(|a| identity.resolve(a))
            .collect();
        let Some(at) = chain.iter().position(|a| matches!(a.kind, ContainerKind::Note(_))) else {
            main_items.push(Item { out: *out, chain });
            continue;
        };
        let note = chain[at].clone();
        chain.drain(..=at);
        let item = Item { out: *out, chain };
        match notes.iter_mut().find(|g| g.note.unid == note.unid) {
            Some(group) => group.items.push(item),
            None => notes.push(NoteGroup {
                note,
                items: vec![item],
            }),
        }
    }

    let mut builder = Builder {
        sides,
        plan,
        settings,
        identity,
        output: base.snapshot.document.clone(),
        relocator: Relocator::new(),
        ids: RevisionIds::new(),
        collector: RevisionCollector::new(),
        part: PartKind::Main,
        part_path: base.snapshot.document.main_part().to_string(),
        note_ids: HashMap::new(),
        next_note_id: HashMap::new(),
    };

    let main_refs: Vec<&Item> = main_items.iter().collect();
    let blocks = builder.blocks(&main_refs, 0)?;
    let mut main = base.snapshot.main.clone();
    let body = base.snapshot.body;
    let section = main
        .element_children(body)
        .filter(|&c| main.is_named(c, W::NS, "sectPr"))
        .last()
        .map(|c| XmlFragment::extract(&main, c));
    main.clear_children(body);
    for block in &blocks {
        block.graft(&mut main, body);
    }
    if let Some(section) = section {
        section.graft(&mut main, body);
    }
    let main_path = builder.output.main_part().to_string();
    builder.output.package_mut().put_xml_part(&main_path, &main)?;
    let mut revisions = std::mem::take(&mut builder.collector).finish();

    for kind in NoteKind::ALL {
        let groups: Vec<&NoteGroup> = notes
            .iter()
            .filter(|g| g.note.kind == ContainerKind::Note(kind))
            .collect();
        revisions.extend(builder.notes_part(kind, &groups)?);
    }

    debug!(
        "projected {} stream entries into {} blocks, {} revisions",
        plan.stream.len(),
        blocks.len(),
        revisions.len()
    );
    Ok(Projection {
        document: builder.output,
        revisions,
    })
}

fn check_plan(sides: &[ProjectionSide<'_>], plan: &ProjectionPlan) -> Result<()> {
    let invalid = |message: String| CompareError::projection("plan", "document", message);
    if plan.base_side >= sides.len() {
        return Err(invalid(format!("base side {} of {}", plan.base_side, sides.len())));
    }
    let in_range = |(side, index): (usize, usize)| sides.get(side).is_some_and(|s| index < s.atoms.len());
    for out in &plan.stream {
        if !in_range((out.side, out.index)) || !out.other.map_or(true, in_range) {
            return Err(invalid(format!("atom {}:{} out of range", out.side, out.index)));
        }
        if out.attribution >= plan.attributions.len() {
            return Err(invalid(format!("attribution {} out of range", out.attribution)));
        }
    }
    for &(a, b) in &plan.links {
        if !in_range(a) || !in_range(b) {
            return Err(invalid(format!("link {}:{} - {}:{} out of range", a.0, a.1, b.0, b.1)));
        }
    }
    Ok(())
}

/// Container identity across sides. Each non-base container maps to at
/// most one base container per side, and the first link wins.
struct Identity {
    base: usize,
    alias: HashMap<String, String>,
    claimed: HashMap<(String, usize), String>,
    ancestors: HashMap<String, Arc<Ancestor>>,
}

impl Identity {
    fn build(sides: &[ProjectionSide<'_>], plan: &ProjectionPlan) -> Self {
        let mut identity = Identity {
            base: plan.base_side,
            alias: HashMap::new(),
            claimed: HashMap::new(),
            ancestors: HashMap::new(),
        };
        for side in sides {
            for atom in side.atoms {
                for ancestor in &atom.ancestors {
                    identity
                        .ancestors
                        .entry(ancestor.unid.clone())
                        .or_insert_with(|| Arc::clone(ancestor));
                }
            }
        }

        for (left, right) in &plan.container_pairs {
            let pair = (identity.ancestors.get(left).cloned(), identity.ancestors.get(right).cloned());
            if let (Some(left), Some(right)) = pair {
                identity.link(&left, &right);
            }
        }

        let matched = plan
            .stream
            .iter()
            .filter_map(|out| out.other.map(|other| ((out.side, out.index), other)))
            .chain(plan.links.iter().copied());
        for ((side, index), (other_side, other_index)) in matched {
            let emitted = &sides[side].atoms[index];
            let other = &sides[other_side].atoms[other_index];
            for (a, b) in emitted.ancestors.iter().zip(&other.ancestors) {
                if !identity.link(a, b) {
                    break;
                }
            }
            if let (
                AtomContent::NoteReference { note: a, .. },
                AtomContent::NoteReference { note: b, .. },
            ) = (&emitted.content, &other.content)
            {
                let pair = (identity.ancestors.get(a).cloned(), identity.ancestors.get(b).cloned());
                if let (Some(a), Some(b)) = pair {
                    identity.link(&a, &b);
                }
            }
        }
        identity
    }

    fn link(&mut self, a: &Ancestor, b: &Ancestor) -> bool {
        if a.kind != b.kind {
            return false;
        }
        let (base, other) = if a.side == self.base {
            (a, b)
        } else if b.side == self.base {
            (b, a)
        } else {
            return false;
        };
        if other.side == self.base {
            return base.unid == other.unid;
        }
        if let Some(existing) = self.alias.get(&other.unid) {
            return existing == &base.unid;
        }
        let key = (base.unid.clone(), other.side);
        if let Some(claimer) = self.claimed.get(&key) {
            return claimer == &other.unid;
        }
        self.alias.insert(other.unid.clone(), base.unid.clone());
        self.claimed.insert(key, other.unid.clone());
        true
    }

    fn canonical<'u>(&'u self, unid: &'u str) -> &'u str {
        self.alias.get(unid).map_or(unid, String::as_str)
    }

    /// The container an ancestor is rebuilt as.
    fn resolve(&self, ancestor: &Arc<Ancestor>) -> Arc<Ancestor> {
        self.ancestors
            .get(self.canonical(&ancestor.unid))
            .cloned()
            .unwrap_or_else(|| Arc::clone(ancestor))
    }
}

struct Item {
    out: OutAtom,
    /// Canonical containers, outermost first.
    chain: Vec<Arc<Ancestor>>,
}

struct NoteGroup {
    note: Arc<Ancestor>,
    items: Vec<Item>,
}

/// A tracked-change wrapper around a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Wrap {
    kind: ChangeKind,
    stamp: Stamp,
    move_id: Option<u32>,
    /// Produced by this projection rather than carried from an input.
    new: bool,
    attribution: usize,
}

type Leaf<'i> = (&'i Item, Vec<Wrap>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunKey {
    standalone: Option<usize>,
    properties: String,
    format_change: Option<String>,
}

struct Builder<'p> {
    sides: &'p [ProjectionSide<'p>],
    plan: &'p ProjectionPlan,
    settings: &'p WmlComparerSettings,
    identity: Identity,
    output: WmlDocument,
    relocator: Relocator,
    ids: RevisionIds,
    collector: RevisionCollector,
    /// Output part being built.
    part: PartKind,
    part_path: String,
    note_ids: HashMap<String, String>,
    next_note_id: HashMap<NoteKind, i64>,
}

impl<'p> Builder<'p> {
    fn atom(&self, (side, index): (usize, usize)) -> &'p ComparisonAtom {
        let sides = self.sides;
        &sides[side].atoms[index]
    }

    fn emitted(&self, item: &Item) -> &'p ComparisonAtom {
        self.atom((item.out.side, item.out.index))
    }

    fn is_own_mark(&self, item: &Item, depth: usize) -> bool {
        item.chain.len() == depth + 1 && self.emitted(item).is_paragraph_mark()
    }

    fn stamp(&self, attribution: usize) -> Stamp {
        let a = &self.plan.attributions[attribution];
        Stamp::new(&a.author, Some(&a.date))
    }

    fn item(&self, kind: RevisionKind, attribution: usize, text: String, move_id: Option<u32>, mark: bool) -> RevisionItem {
        let a = &self.plan.attributions[attribution];
        RevisionItem {
            kind,
            mark,
            author: a.author.clone(),
            date: Some(a.date.clone()),
            text,
            part: self.part,
            move_id,
            color: a.color,
        }
    }

    /// Copies markup of `side` into the output part being built: fresh
    /// revision ids, and relationship ids of other packages relocated.
    fn adopt(&mut self, side: usize, part: PartKind, fragment: &mut XmlFragment) -> Result<()> {
        renumber(fragment, &mut self.ids);
        if side == self.plan.base_side {
            return Ok(());
        }
        let sides = self.sides;
        let snapshot = sides[side].snapshot;
        self.relocator.relocate(
            &mut self.output,
            fragment,
            snapshot.document,
            snapshot.part_path(part),
            &self.part_path,
        )
    }

    fn shell(&mut self, ancestor: &Ancestor) -> Result<XmlFragment> {
        let mut shell = (*ancestor.shell).clone();
        self.adopt(ancestor.side, ancestor.part, &mut shell)?;
        Ok(shell)
    }

    /// Block-level content: paragraphs, tables, rows, cells.
    fn blocks(&mut self, items: &[&Item], depth: usize) -> Result<Vec<XmlFragment>> {
        let groups = group_adjacent(items.iter().copied(), |it| it.chain.get(depth).map(|a| a.unid.clone()));
        let groups = self.settle_paragraphs(groups, depth);

        let mut out = Vec::new();
        for group in groups {
            let Some(ancestor) = group[0].chain.get(depth).cloned() else {
                let container = depth
                    .checked_sub(1)
                    .and_then(|d| group[0].chain.get(d))
                    .map_or("body", |a| a.kind.label());
                return Err(CompareError::projection(
                    self.emitted(group[0]).to_string(),
                    container,
                    "content outside a paragraph",
                ));
            };
            out.extend(self.container(&ancestor, &group, depth, false)?);
        }
        Ok(out)
    }

    /// Paragraph-level content: runs, and containers inside paragraphs.
    fn inline(&mut self, items: &[&Item], depth: usize) -> Result<Vec<XmlFragment>> {
        let mut out = Vec::new();
        for group in group_adjacent(items.iter().copied(), |it| it.chain.get(depth).map(|a| a.unid.clone())) {
            match group[0].chain.get(depth).cloned() {
                Some(ancestor) => out.extend(self.container(&ancestor, &group, depth, true)?),
                None => {
                    let leaves: Vec<Leaf<'_>> = group.iter().map(|it| (*it, self.wraps(it))).collect();
                    let refs: Vec<&Leaf<'_>> = leaves.iter().collect();
                    out.extend(self.wrapped(&refs, 0)?);
                }
            }
        }
        Ok(out)
    }

    /// A paragraph group without its own mark joins the paragraph before
    /// it, or else the one after it.
    fn settle_paragraphs<'i>(&self, groups: Vec<Vec<&'i Item>>, depth: usize) -> Vec<Vec<&'i Item>> {
        let is_paragraph = |g: &[&Item]| {
            g.first()
                .and_then(|it| it.chain.get(depth))
                .is_some_and(|a| a.kind == ContainerKind::Paragraph)
        };
        let mut out: Vec<Vec<&Item>> = Vec::new();
        let mut carry: Vec<&Item> = Vec::new();
        for mut group in groups {
            let markless = is_paragraph(&group) && !group.iter().any(|it| self.is_own_mark(it, depth));
            if markless {
                match out.last_mut().filter(|prev| is_paragraph(prev)) {
                    Some(prev) => {
                        let at = match prev.last() {
                            Some(last) if self.is_own_mark(last, depth) => prev.len() - 1,
                            _ => prev.len(),
                        };
                        prev.splice(at..at, group);
                    }
                    None => carry.extend(group),
                }
                continue;
            }
            if !carry.is_empty() {
                if is_paragraph(&group) {
                    carry.append(&mut group);
                    group = std::mem::take(&mut carry);
                } else {
                    out.push(std::mem::take(&mut carry));
                }
            }
            out.push(group);
        }
        if !carry.is_empty() {
            out.push(carry);
        }
        out
    }

    fn container(
        &mut self,
        ancestor: &Arc<Ancestor>,
        items: &[&Item],
        depth: usize,
        inline: bool,
    ) -> Result<Vec<XmlFragment>> {
        match ancestor.kind {
            ContainerKind::Paragraph => {
                let pieces = self.paragraph_pieces(items, depth);
                pieces
                    .iter()
                    .map(|piece| self.paragraph(ancestor, piece, depth))
                    .collect()
            }
            ContainerKind::Row => Ok(vec![self.row(ancestor, items, depth)?]),
            ContainerKind::TextBox => Ok(vec![self.textbox(ancestor, items, depth)?]),
            ContainerKind::Note(_) => Err(CompareError::projection(
                self.emitted(items[0]).to_string(),
                ancestor.kind.label(),
                "note content outside its part",
            )),
            ContainerKind::Sdt => {
                let mut sdt = self.shell(ancestor)?;
                let content = if inline {
                    self.inline(items, depth + 1)?
                } else {
                    self.blocks(items, depth + 1)?
                };
                sdt.children.push(XmlFragment {
                    node: XmlNodeData::element(W::sdtContent()),
                    children: content,
                });
                Ok(vec![sdt])
            }
            ContainerKind::Table | ContainerKind::Cell => {
                let mut element = self.shell(ancestor)?;
                element.children.extend(self.blocks(items, depth + 1)?);
                Ok(vec![element])
            }
            ContainerKind::CustomXml if !inline => {
                let mut element = self.shell(ancestor)?;
                element.children.extend(self.blocks(items, depth + 1)?);
                Ok(vec![element])
            }
            ContainerKind::CustomXml
            | ContainerKind::Hyperlink
            | ContainerKind::SmartTag
            | ContainerKind::SimpleField
            | ContainerKind::Bidi => {
                let mut element = self.shell(ancestor)?;
                element.children.extend(self.inline(items, depth + 1)?);
                Ok(vec![element])
            }
        }
    }

    /// Splits a paragraph group after each of its marks. Content trailing
    /// the last mark belongs before it.
    fn paragraph_pieces<'i>(&self, items: &[&'i Item], depth: usize) -> Vec<Vec<&'i Item>> {
        let mut pieces = split_after(items.iter().copied(), |it| self.is_own_mark(it, depth));
        let trailing = pieces.len() > 1
            && pieces
                .last()
                .is_some_and(|p| !p.iter().any(|it| self.is_own_mark(it, depth)));
        if trailing {
            if let Some(tail) = pieces.pop() {
                if let Some(previous) = pieces.last_mut() {
                    let at = previous.len().saturating_sub(1);
                    previous.splice(at..at, tail);
                }
            }
        }
        pieces
    }

    fn paragraph(&mut self, ancestor: &Ancestor, piece: &[&Item], depth: usize) -> Result<XmlFragment> {
        let mut paragraph = self.shell(ancestor)?;
        let mark = piece.last().copied().filter(|it| self.is_own_mark(it, depth));
        let content: Vec<&Item> = match mark {
            Some(_) => piece[..piece.len() - 1].to_vec(),
            None => piece.to_vec(),
        };
        let children = self.inline(&content, depth + 1)?;
        if let Some(properties) = self.mark_properties(mark)? {
            paragraph.children.push(properties);
        }
        paragraph.children.extend(children);
        Ok(paragraph)
    }

    /// `w:pPr` of a paragraph with its mark's revision markers.
    fn mark_properties(&mut self, mark: Option<&Item>) -> Result<Option<XmlFragment>> {
        let Some(mark) = mark else {
            self.collector.break_group();
            return Ok(None);
        };
        let atom = self.emitted(mark);
        let mut ppr = atom
            .properties
            .as_deref()
            .cloned()
            .unwrap_or_else(|| XmlFragment::element(W::pPr()));
        self.adopt(mark.out.side, atom.source.part, &mut ppr)?;

        let mut format_changed = false;
        if mark.out.status == Status::Equal && self.settings.track_formatting_changes {
            if let Some(other) = mark.out.other.map(|o| self.atom(o)) {
                let old = other.properties.as_deref();
                if paragraph_format_signature(Some(&ppr)) != paragraph_format_signature(old) {
                    let id = self.ids.next();
                    add_paragraph_change(&mut ppr, old, &id, &self.stamp(mark.out.attribution));
                    format_changed = true;
                }
            }
        }

        let mut wraps = self.wraps(mark);
        wraps.sort_by_key(|w| w.kind.marker_rank());
        let markers = wraps
            .iter()
            .map(|w| revision_element(w.kind.element(), &self.ids.next(), &w.stamp))
            .collect();
        add_mark_markers(&mut ppr, markers);

        if format_changed {
            let item = self.item(RevisionKind::ParagraphPropertiesChanged, mark.out.attribution, String::new(), None, false);
            self.collector.push(item);
        }
        match wraps.iter().find(|w| w.new) {
            Some(w) => {
                let item = self.item(RevisionKind::of_change(w.kind), w.attribution, String::new(), w.move_id, true);
                self.collector.push(item);
            }
            None => self.collector.break_group(),
        }

        let empty = ppr.children.is_empty() && ppr.node.attributes().map_or(true, |a| a.is_empty());
        Ok((!empty).then_some(ppr))
    }

    fn row(&mut self, ancestor: &Ancestor, items: &[&Item], depth: usize) -> Result<XmlFragment> {
        let mut row = self.shell(ancestor)?;
        let start = self.collector.len();
        let cells = self.blocks(items, depth + 1)?;
        let has_cells = cells
            .iter()
            .any(|c| c.is(W::NS, "tc") || c.is(W::NS, "sdt") || c.is(W::NS, "customXml"));
        if !has_cells {
            return Err(CompareError::projection(
                items.first().map(|it| self.emitted(it).to_string()).unwrap_or_default(),
                "row",
                "row without cells",
            ));
        }

        if let Some((kind, attribution)) = self.uniform_change(items) {
            let row_kind = if kind.removes() { ChangeKind::Deleted } else { ChangeKind::Inserted };
            let marked = row
                .child(W::NS, "trPr")
                .is_some_and(|trpr| trpr.child(W::NS, if kind.removes() { "del" } else { "ins" }).is_some());
            if !marked {
                let id = self.ids.next();
                add_row_marker(&mut row, revision_element(row_kind.element(), &id, &self.stamp(attribution)));
            }
            let revision = if kind.removes() { RevisionKind::RowDeleted } else { RevisionKind::RowInserted };
            if self.collector.len() == start {
                let item = self.item(revision, attribution, String::new(), None, false);
                self.collector.push(item);
            } else {
                self.collector.collapse_since(start, revision);
            }
        }
        row.children.extend(cells);
        Ok(row)
    }

    /// A run whose object holds text box content. Every `w:txbxContent` of
    /// the shell (fallback markup repeats it) receives the rebuilt content.
    fn textbox(&mut self, ancestor: &Ancestor, items: &[&Item], depth: usize) -> Result<XmlFragment> {
        let mut run = self.shell(ancestor)?;
        let change = self.uniform_change(items);
        match change {
            Some((kind, attribution)) => {
                let item = self.item(RevisionKind::of_change(kind), attribution, String::new(), None, false);
                self.collector.push(item);
            }
            None => self.collector.break_group(),
        }

        let content = self.blocks(items, depth + 1)?;
        let ids = &mut self.ids;
        let mut first = true;
        run.walk_mut(&mut |el| {
            if !el.is(W::NS, "txbxContent") {
                return;
            }
            el.children = content.clone();
            if !first {
                for child in &mut el.children {
                    renumber(child, ids);
                }
            }
            first = false;
        });

        Ok(match change {
            Some((kind, attribution)) => {
                let kind = if kind.removes() { ChangeKind::Deleted } else { ChangeKind::Inserted };
                let id = self.ids.next();
                revision_element(kind.element(), &id, &self.stamp(attribution)).with_child(run)
            }
            None => run,
        })
    }

    /// The change shared by all of `items`, reduced to removal or addition.
    fn uniform_change(&self, items: &[&Item]) -> Option<(ChangeKind, usize)> {
        let first = items.first()?;
        let (kind, _) = first.out.status.change()?;
        let all = items.iter().all(|it| {
            it.out
                .status
                .change()
                .is_some_and(|(k, _)| k.removes() == kind.removes())
        });
        all.then_some((kind, first.out.attribution))
    }

    /// Wrappers of a leaf, outermost first: carried ones plus the new one.
    fn wraps(&self, item: &Item) -> Vec<Wrap> {
        let atom = self.emitted(item);
        let mut wraps: Vec<Wrap> = atom
            .existing
            .iter()
            .map(|e| Wrap {
                kind: e.kind,
                stamp: Stamp::new(&e.author, e.date.as_deref()),
                move_id: None,
                new: false,
                attribution: item.out.attribution,
            })
            .collect();
        if let Some((kind, move_id)) = item.out.status.change() {
            if !atom.existing.iter().any(|e| e.kind == kind) {
                wraps.push(Wrap {
                    kind,
                    stamp: self.stamp(item.out.attribution),
                    move_id,
                    new: true,
                    attribution: item.out.attribution,
                });
            }
        }
        wraps.sort_by_key(|w| w.kind.nesting_rank());
        wraps
    }

    fn wrapped(&mut self, leaves: &[&Leaf<'_>], level: usize) -> Result<Vec<XmlFragment>> {
        let mut out = Vec::new();
        for group in group_adjacent(leaves.iter().copied(), |(_, wraps)| wraps.get(level).cloned()) {
            let Some(wrap) = group[0].1.get(level).cloned() else {
                out.extend(self.runs(&group)?);
                continue;
            };
            let inner = self.wrapped(&group, level + 1)?;
            let id = self.ids.next();
            let mut element = revision_element(wrap.kind.element(), &id, &wrap.stamp);
            element.children = inner;
            match wrap.move_id.filter(|_| wrap.new) {
                Some(n) => {
                    let (start, end) = move_range(wrap.kind, &mut self.ids, &format!("move{}", n), &wrap.stamp);
                    out.extend([start, element, end]);
                }
                None => out.push(element),
            }
        }
        Ok(out)
    }

    fn run_key(&self, position: usize, (item, _): &Leaf<'_>) -> RunKey {
        let atom = self.emitted(item);
        RunKey {
            standalone: (!atom.in_run).then_some(position),
            properties: atom.properties.as_ref().map(|p| p.canonical()).unwrap_or_default(),
            format_change: self
                .previous_format(item)
                .map(|old| old.map(|p| p.canonical()).unwrap_or_default()),
        }
    }

    /// Run properties an equal atom had on the other side, when they differ
    /// and formatting is tracked.
    fn previous_format(&self, item: &Item) -> Option<Option<&'p XmlFragment>> {
        if item.out.status != Status::Equal || !self.settings.track_formatting_changes {
            return None;
        }
        let atom = self.emitted(item);
        let other = self.atom(item.out.other?);
        (atom.in_run && atom.properties_signature() != other.properties_signature())
            .then_some(other.properties.as_deref())
    }

    fn runs(&mut self, leaves: &[&Leaf<'_>]) -> Result<Vec<XmlFragment>> {
        let keyed: Vec<(&Leaf<'_>, RunKey)> = leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| (*leaf, self.run_key(i, leaf)))
            .collect();

        let mut out = Vec::new();
        for group in group_adjacent(keyed.into_iter(), |(_, key)| key.clone()) {
            let members: Vec<&Leaf<'_>> = group.into_iter().map(|(leaf, _)| leaf).collect();
            out.push(self.run(&members)?);
        }
        Ok(out)
    }

    fn run(&mut self, members: &[&Leaf<'_>]) -> Result<XmlFragment> {
        let (first, wraps) = members[0];
        let atom = self.emitted(first);
        let removed = wraps.iter().any(|w| w.kind.removes());
        let text: String = members
            .iter()
            .map(|(item, _)| self.emitted(item).display_text())
            .collect();

        let fragment = if atom.in_run {
            let mut run = XmlFragment::element(W::r());
            match self.previous_format(first) {
                Some(old) => {
                    let id = self.ids.next();
                    let stamp = self.stamp(first.out.attribution);
                    run.children
                        .push(run_properties_with_change(atom.properties.as_deref(), old, &id, &stamp));
                    let item = self.item(RevisionKind::FormatChanged, first.out.attribution, text.clone(), None, false);
                    self.collector.push(item);
                }
                None => {
                    if let Some(props) = &atom.properties {
                        let mut props = (**props).clone();
                        renumber(&mut props, &mut self.ids);
                        run.children.push(props);
                    }
                }
            }

            let mut pending = String::new();
            for (item, _) in members {
                let leaf = self.emitted(item);
                match &leaf.content {
                    AtomContent::Text(t) => pending.push_str(t),
                    _ => {
                        if !pending.is_empty() {
                            run.children.push(text_element(&std::mem::take(&mut pending), removed));
                        }
                        run.children.push(self.element(item, removed)?);
                    }
                }
            }
            if !pending.is_empty() {
                run.children.push(text_element(&pending, removed));
            }
            run
        } else {
            self.element(first, removed)?
        };

        match wraps.iter().find(|w| w.new) {
            Some(w) => {
                let item = self.item(RevisionKind::of_change(w.kind), w.attribution, text, w.move_id, false);
                self.collector.push(item);
            }
            None => self.collector.break_group(),
        }
        Ok(fragment)
    }

    fn element(&mut self, item: &Item, removed: bool) -> Result<XmlFragment> {
        let atom = self.emitted(item);
        let mut fragment = atom.element.as_deref().cloned().ok_or_else(|| {
            CompareError::projection(atom.to_string(), "run", "object atom without markup")
        })?;
        self.adopt(item.out.side, atom.source.part, &mut fragment)?;
        if let AtomContent::NoteReference { kind, note } = &atom.content {
            let id = self.note_id(*kind, note);
            fragment.set_attribute(W::id(), &id);
        }
        Ok(if removed { as_removed(fragment) } else { fragment })
    }

    fn note_id(&mut self, kind: NoteKind, note: &str) -> String {
        let canonical = self.identity.canonical(note).to_string();
        if let Some(id) = self.note_ids.get(&canonical) {
            return id.clone();
        }
        let start = self.first_note_id(kind);
        let next = self.next_note_id.entry(kind).or_insert(start);
        let id = next.to_string();
        *next += 1;
        self.note_ids.insert(canonical, id.clone());
        id
    }

    /// Numbering starts at the configured id, above any separator note the
    /// base part keeps.
    fn first_note_id(&self, kind: NoteKind) -> i64 {
        let sides = self.sides;
        let specials = sides[self.plan.base_side]
            .snapshot
            .notes(kind)
            .map_or(-1, |n| n.max_special_id());
        i64::from(self.settings.starting_id_for_footnotes_endnotes).max(specials + 1)
    }

    /// Writes the footnotes or endnotes part: separator notes of the
    /// template part, then every rebuilt note in id order.
    fn notes_part(&mut self, kind: NoteKind, groups: &[&NoteGroup]) -> Result<Vec<Revision>> {
        let base = self.plan.base_side;
        let sides = self.sides;
        let template = sides[base].snapshot.notes(kind).or_else(|| {
            sides
                .iter()
                .find_map(|side| side.snapshot.notes(kind))
                .filter(|_| !groups.is_empty())
        });
        if groups.is_empty() && template.is_none() {
            return Ok(Vec::new());
        }

        let mut doc = match template {
            Some(notes) => {
                let mut doc = notes.xml.clone();
                let remove: Vec<_> = doc
                    .root()
                    .into_iter()
                    .flat_map(|root| doc.element_children(root))
                    .filter(|&n| !notes.is_special(n))
                    .collect();
                for note in remove {
                    doc.remove(note);
                }
                doc
            }
            None => XmlFragment::element(XName::new(W::NS, kind.root_element())).into_document(),
        };
        let path = match sides[base].snapshot.notes(kind) {
            Some(notes) => notes.path.clone(),
            None => self.output.add_notes_part(kind)?,
        };
        self.part_path = path.clone();
        self.part = kind.part();
        self.collector = RevisionCollector::new();

        let mut numbered: Vec<(i64, &NoteGroup)> = groups
            .iter()
            .map(|g| {
                let id = self.note_id(kind, &g.note.unid);
                (id.parse::<i64>().unwrap_or(i64::MAX), *g)
            })
            .collect();
        numbered.sort_by_key(|(id, _)| *id);

        let root = match doc.root() {
            Some(root) => root,
            None => doc.add_root(XmlNodeData::element(XName::new(W::NS, kind.root_element()))),
        };
        for (id, group) in numbered {
            let mut note = self.shell(&group.note)?;
            note.set_attribute(W::id(), &id.to_string());
            let items: Vec<&Item> = group.items.iter().collect();
            let content = self.blocks(&items, 0)?;
            if content.is_empty() {
                note.children.push(XmlFragment::element(W::p()));
            }
            note.children.extend(content);
            note.graft(&mut doc, root);
        }

        self.output.package_mut().put_xml_part(&path, &doc)?;
        Ok(std::mem::take(&mut self.collector).finish())
    }
}
