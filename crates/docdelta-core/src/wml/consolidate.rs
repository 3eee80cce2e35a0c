//! Consolidation of several reviewers' documents into one.
//!
//! Every revised document is compared against the original on its own and
//! each script is cut into hunks: a removed span of original atoms together
//! with what the reviewer put in its place. The hunks are merged over the
//! original's atom sequence in reviewer order. A hunk another reviewer
//! already made identically is reported as suppressed; every other hunk is
//! kept and attributed to its reviewer, so overlapping edits show up once
//! per reviewer. With `consolidate_with_table`, each block a single
//! reviewer changed is wrapped in a one-cell table shaded with that
//! reviewer's colour and captioned with their name.

use super::align::{align, Alignment};
use super::atom::ComparisonAtom;
use super::content::ContainerKind;
use super::decompose::decompose;
use super::document::{find_document_body, DocumentSnapshot, WmlDocument};
use super::markup::{text_element, REVISION_ELEMENTS};
use super::project::{project, Attribution, OutAtom, ProjectionPlan, ProjectionSide, Status};
use super::moves::detect_moves;
use super::revisions::{Revision, RevisionKind};
use super::script::ScriptEntry;
use super::settings::{Rgb, WmlComparerConsolidateSettings, WmlComparerSettings, WmlRevisedDocumentInfo};
use crate::error::{CompareError, Result};
use crate::xml::namespaces::W;
use crate::xml::{XmlDocument, XmlFragment};
use indextree::NodeId;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;

/// Revisions attributed to one reviewer in the consolidated output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerSummary {
    pub revisor: String,
    pub color: Rgb,
    pub revisions: usize,
}

/// A reviewer whose document could not be compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationFailure {
    pub revisor: String,
    pub message: String,
}

/// A change that an earlier reviewer already made identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppressedChange {
    pub revisor: String,
    pub kind: RevisionKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ConsolidationResult {
    pub document: WmlDocument,
    pub revisions: Vec<Revision>,
    pub per_reviewer: Vec<ReviewerSummary>,
    pub failures: Vec<ConsolidationFailure>,
    pub suppressed: Vec<SuppressedChange>,
}

/// Consolidates `revised` into `original` with default consolidation settings.
pub fn consolidate(
    original: &WmlDocument,
    revised: &[WmlRevisedDocumentInfo],
    settings: &WmlComparerSettings,
) -> Result<ConsolidationResult> {
    consolidate_with_settings(original, revised, settings, &WmlComparerConsolidateSettings::default())
}

pub fn consolidate_with_settings(
    original: &WmlDocument,
    revised: &[WmlRevisedDocumentInfo],
    settings: &WmlComparerSettings,
    consolidate_settings: &WmlComparerConsolidateSettings,
) -> Result<ConsolidationResult> {
    settings.validate()?;
    // Formatting of equal content always comes from the original.
    let settings = WmlComparerSettings {
        track_formatting_changes: false,
        ..settings.clone()
    };

    let base = original.snapshot()?;
    let original_atoms = decompose(&base, 0, &settings)?;

    let mut failures = Vec::new();
    let mut fail = |info: &WmlRevisedDocumentInfo, err: CompareError| -> Result<()> {
        if consolidate_settings.fail_fast {
            return Err(err);
        }
        warn!("skipping reviewer {}: {}", info.revisor, err);
        failures.push(ConsolidationFailure {
            revisor: info.revisor.clone(),
            message: err.to_string(),
        });
        Ok(())
    };

    let mut snapshots: Vec<Option<DocumentSnapshot<'_>>> = Vec::with_capacity(revised.len());
    for info in revised {
        match info.revised_document.snapshot() {
            Ok(snapshot) => snapshots.push(Some(snapshot)),
            Err(err) => {
                fail(info, err)?;
                snapshots.push(None);
            }
        }
    }

    let mut reviews: Vec<Review> = Vec::new();
    for (reviewer, (info, snapshot)) in revised.iter().zip(&snapshots).enumerate() {
        let Some(snapshot) = snapshot else {
            continue;
        };
        match review(&original_atoms, snapshot, reviewer, &settings) {
            Ok(review) => reviews.push(review),
            Err(err) => fail(info, err)?,
        }
    }

    if reviews.is_empty() {
        debug!("no reviewer could be compared; returning the original");
        return Ok(ConsolidationResult {
            document: original.clone(),
            revisions: Vec::new(),
            per_reviewer: summaries(revised, &[]),
            failures,
            suppressed: Vec::new(),
        });
    }

    let merged = merge(&original_atoms, &reviews, revised);

    let sides: Vec<ProjectionSide<'_>> = std::iter::once(ProjectionSide {
        atoms: &original_atoms,
        snapshot: &base,
    })
    .chain(snapshots.iter().enumerate().map(|(reviewer, snapshot)| {
        match (snapshot, reviews.iter().find(|r| r.reviewer == reviewer)) {
            (Some(snapshot), Some(review)) => ProjectionSide {
                atoms: &review.alignment.right,
                snapshot,
            },
            _ => ProjectionSide {
                atoms: &[],
                snapshot: &base,
            },
        }
    }))
    .collect();

    let plan = ProjectionPlan {
        stream: merged.stream,
        container_pairs: reviews
            .iter()
            .flat_map(|r| r.alignment.script.container_pairs.iter().cloned())
            .collect(),
        links: merged.links,
        base_side: 0,
        attributions: revised
            .iter()
            .map(|info| Attribution {
                author: info.revisor.clone(),
                date: info.revised_document.revision_date(&settings),
                color: Some(info.color),
            })
            .collect(),
    };
    let mut projection = project(&sides, &plan, &settings)?;
    if consolidate_settings.consolidate_with_table && !projection.revisions.is_empty() {
        wrap_reviewer_blocks(&mut projection.document, revised)?;
    }

    debug!(
        "consolidated {} of {} reviewers: {} revisions, {} suppressed",
        reviews.len(),
        revised.len(),
        projection.revisions.len(),
        merged.suppressed.len()
    );
    Ok(ConsolidationResult {
        per_reviewer: summaries(revised, &projection.revisions),
        document: projection.document,
        revisions: projection.revisions,
        failures,
        suppressed: merged.suppressed,
    })
}

/// One reviewer compared against the original.
struct Review {
    /// Position in the reviewer list; the projection side is one more.
    reviewer: usize,
    alignment: Alignment,
    /// Original atom index of each aligned left atom.
    origin: Vec<usize>,
}

impl Review {
    fn side(&self) -> usize {
        self.reviewer + 1
    }
}

fn review(
    original: &[ComparisonAtom],
    snapshot: &DocumentSnapshot<'_>,
    reviewer: usize,
    settings: &WmlComparerSettings,
) -> Result<Review> {
    let right = decompose(snapshot, reviewer + 1, settings)?;
    let mut alignment = align(original, &right, settings)?;
    let moves = detect_moves(&mut alignment, settings);
    let origin = origins(original, &alignment.left)?;
    debug!(
        "reviewer {}: {:?}, {} moves",
        reviewer,
        alignment.script.counts(),
        moves
    );
    Ok(Review {
        reviewer,
        alignment,
        origin,
    })
}

/// Maps aligned atoms back to the original ones. The aligner may cut an
/// original word into pieces; the pieces follow each other.
fn origins(original: &[ComparisonAtom], aligned: &[ComparisonAtom]) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(aligned.len());
    let mut i = 0;
    let mut consumed = 0;
    for atom in aligned {
        let Some(source) = original.get(i) else {
            return Err(CompareError::projection(
                atom.to_string(),
                "document",
                "aligned atoms run past the original",
            ));
        };
        out.push(i);
        match (atom.text(), source.text()) {
            (Some(piece), Some(whole)) => {
                consumed += piece.chars().count();
                if consumed >= whole.chars().count() {
                    i += 1;
                    consumed = 0;
                }
            }
            _ => i += 1,
        }
    }
    Ok(out)
}

/// One reviewer's contiguous change: the original atoms it removes and
/// what it puts in their place, in script order.
struct Hunk {
    reviewer: usize,
    side: usize,
    /// Removed original range; `start == end` for a pure insertion into
    /// the gap before `start`.
    start: usize,
    end: usize,
    changes: Vec<Change>,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    /// An original atom, by index.
    Removed(usize, Status),
    /// A reviewer atom, by index on the reviewer's side.
    Added(usize, Status),
}

impl Hunk {
    fn removes(&self) -> bool {
        self.end > self.start
    }

    fn out(&self, change: Change) -> OutAtom {
        let (side, index, status) = match change {
            Change::Removed(index, status) => (0, index, status),
            Change::Added(index, status) => (self.side, index, status),
        };
        OutAtom {
            side,
            index,
            status,
            attribution: self.reviewer,
            other: None,
        }
    }
}

/// Range and content of a hunk; move ids differ between reviewers and are
/// left out.
type Signature<'a> = (usize, usize, Vec<(bool, bool, &'a str)>);

fn signature<'a>(hunk: &Hunk, original: &'a [ComparisonAtom], right: &'a [ComparisonAtom]) -> Signature<'a> {
    let changes = hunk
        .changes
        .iter()
        .map(|change| match *change {
            Change::Removed(o, status) => (true, is_move(status), original[o].hash.as_str()),
            Change::Added(i, status) => (false, is_move(status), right[i].hash.as_str()),
        })
        .collect();
    (hunk.start, hunk.end, changes)
}

fn is_move(status: Status) -> bool {
    matches!(status, Status::MovedFrom(_) | Status::MovedTo(_))
}

fn right_atoms(reviews: &[Review], side: usize) -> &[ComparisonAtom] {
    reviews
        .iter()
        .find(|r| r.side() == side)
        .map(|r| r.alignment.right.as_slice())
        .unwrap_or_default()
}

type Link = ((usize, usize), (usize, usize));

/// Cuts one reviewer's script into hunks and records the links of its
/// equal atoms. Returns the hunks and the highest move id used.
fn hunks(review: &Review, move_offset: u32, links: &mut Vec<Link>) -> (Vec<Hunk>, u32) {
    let side = review.side();
    let mut hunks = Vec::new();
    let mut open: Option<Hunk> = None;
    let mut gap = 0;
    let mut max_move = 0;
    for entry in &review.alignment.script.entries {
        let change = match *entry {
            ScriptEntry::Equal { left, right } => {
                links.push(((0, review.origin[left]), (side, right)));
                hunks.extend(open.take());
                gap = review.origin[left] + 1;
                continue;
            }
            ScriptEntry::Deleted { left } => Change::Removed(review.origin[left], Status::Deleted),
            ScriptEntry::MovedFrom { left, move_id } => {
                max_move = max_move.max(move_id);
                Change::Removed(review.origin[left], Status::MovedFrom(move_offset + move_id))
            }
            ScriptEntry::Inserted { right } => Change::Added(right, Status::Inserted),
            ScriptEntry::MovedTo { right, move_id } => {
                max_move = max_move.max(move_id);
                Change::Added(right, Status::MovedTo(move_offset + move_id))
            }
        };
        let hunk = open.get_or_insert_with(|| Hunk {
            reviewer: review.reviewer,
            side,
            start: gap,
            end: gap,
            changes: Vec::new(),
        });
        if let Change::Removed(o, _) = change {
            // Further pieces of an original atom already removed.
            if hunk.removes() && o < hunk.end {
                continue;
            }
            if !hunk.removes() {
                hunk.start = o;
            }
            hunk.end = o + 1;
            gap = o + 1;
        }
        hunk.changes.push(change);
    }
    hunks.extend(open.take());
    (hunks, max_move)
}

struct Merged {
    stream: Vec<OutAtom>,
    links: Vec<Link>,
    suppressed: Vec<SuppressedChange>,
}

fn merge(original: &[ComparisonAtom], reviews: &[Review], revised: &[WmlRevisedDocumentInfo]) -> Merged {
    let n = original.len();
    let mut links = Vec::new();
    let mut all = Vec::new();
    let mut move_offset = 0;
    for review in reviews {
        let (found, max_move) = hunks(review, move_offset, &mut links);
        all.extend(found);
        move_offset += max_move;
    }

    let mut seen: HashSet<Signature<'_>> = HashSet::new();
    let mut kept: Vec<Hunk> = Vec::new();
    let mut suppressed = Vec::new();
    for hunk in all {
        let right = right_atoms(reviews, hunk.side);
        if seen.insert(signature(&hunk, original, right)) {
            kept.push(hunk);
        } else {
            suppressed.extend(suppressed_changes(&hunk, original, right, revised));
        }
    }

    let mut clusters: Vec<(usize, usize)> = Vec::new();
    let mut ranges: Vec<(usize, usize)> = kept.iter().filter(|h| h.removes()).map(|h| (h.start, h.end)).collect();
    ranges.sort_unstable();
    for (start, end) in ranges {
        match clusters.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => clusters.push((start, end)),
        }
    }
    let inside = |gap: usize| clusters.iter().any(|&(a, b)| a < gap && gap < b);

    let mut at_gap: Vec<Vec<&Hunk>> = vec![Vec::new(); n + 1];
    for hunk in kept.iter().filter(|h| !h.removes() && !inside(h.start)) {
        at_gap[hunk.start].push(hunk);
    }

    let mut stream = Vec::new();
    let mut next = clusters.iter().peekable();
    let mut g = 0;
    loop {
        for hunk in &at_gap[g] {
            stream.extend(hunk.changes.iter().map(|&c| hunk.out(c)));
        }
        if g >= n {
            break;
        }
        match next.next_if(|c| c.0 == g) {
            Some(&(a, b)) => {
                let members: Vec<&Hunk> = kept
                    .iter()
                    .filter(|h| if h.removes() { a <= h.start && h.end <= b } else { a < h.start && h.start < b })
                    .collect();
                lay_out(original, a, b, &members, &mut stream);
                g = b;
            }
            None => {
                stream.push(OutAtom {
                    side: 0,
                    index: g,
                    status: Status::Equal,
                    attribution: 0,
                    other: None,
                });
                g += 1;
            }
        }
    }

    pair_moves(&mut stream);
    Merged {
        stream,
        links,
        suppressed,
    }
}

/// Emits the hunks of one overlap cluster `[a, b)`. Each paragraph the
/// cluster touches is laid out once per hunk, in reviewer order, so every
/// reviewer keeps their own deletion of a shared original atom.
fn lay_out(original: &[ComparisonAtom], a: usize, b: usize, members: &[&Hunk], stream: &mut Vec<OutAtom>) {
    let mut segment = Vec::with_capacity(b - a);
    let mut current = 0;
    for g in a..b {
        if g > a {
            let previous = &original[g - 1];
            let paragraph = |atom: &ComparisonAtom| atom.nearest(ContainerKind::Paragraph).map(|p| p.unid.clone());
            if previous.is_paragraph_mark() || paragraph(previous) != paragraph(&original[g]) {
                current += 1;
            }
        }
        segment.push(current);
    }
    let segment_of = |g: usize| segment[g.clamp(a, b - 1) - a];

    let placed: Vec<Vec<(usize, Change)>> = members
        .iter()
        .map(|hunk| {
            let mut at = segment_of(hunk.start.saturating_sub(usize::from(!hunk.removes())));
            hunk.changes
                .iter()
                .map(|&change| {
                    if let Change::Removed(o, _) = change {
                        at = segment_of(o);
                    }
                    (at, change)
                })
                .collect()
        })
        .collect();

    for s in 0..=current {
        for (hunk, changes) in members.iter().zip(&placed) {
            stream.extend(changes.iter().filter(|(at, _)| *at == s).map(|&(_, c)| hunk.out(c)));
        }
    }
}

/// A move whose other half was dropped as a duplicate is plain insertion
/// or deletion.
fn pair_moves(stream: &mut [OutAtom]) {
    let mut from = HashSet::new();
    let mut to = HashSet::new();
    for out in stream.iter() {
        match out.status {
            Status::MovedFrom(id) => {
                from.insert(id);
            }
            Status::MovedTo(id) => {
                to.insert(id);
            }
            _ => {}
        }
    }
    for out in stream.iter_mut() {
        out.status = match out.status {
            Status::MovedFrom(id) if !to.contains(&id) => Status::Deleted,
            Status::MovedTo(id) if !from.contains(&id) => Status::Inserted,
            status => status,
        };
    }
}

/// A duplicate hunk as reported changes; consecutive changes of one kind
/// form one entry.
fn suppressed_changes(
    hunk: &Hunk,
    original: &[ComparisonAtom],
    right: &[ComparisonAtom],
    revised: &[WmlRevisedDocumentInfo],
) -> Vec<SuppressedChange> {
    let revisor = revised.get(hunk.reviewer).map(|i| i.revisor.clone()).unwrap_or_default();
    let mut out: Vec<SuppressedChange> = Vec::new();
    for change in &hunk.changes {
        let (kind, text) = match *change {
            Change::Removed(o, _) => (RevisionKind::Deleted, original[o].display_text()),
            Change::Added(i, _) => (RevisionKind::Inserted, right[i].display_text()),
        };
        match out.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(&text),
            _ => out.push(SuppressedChange {
                revisor: revisor.clone(),
                kind,
                text,
            }),
        }
    }
    out
}

/// Wraps each run of body blocks whose new revisions all come from one
/// reviewer in a one-cell table shaded with that reviewer's colour and
/// captioned with their name. Blocks touched by several reviewers, and
/// blocks carrying a section break, stay where they are.
fn wrap_reviewer_blocks(document: &mut WmlDocument, revised: &[WmlRevisedDocumentInfo]) -> Result<()> {
    let mut main = document.main_document()?;
    let Some(body) = find_document_body(&main) else {
        return Ok(());
    };
    let blocks: Vec<(Option<usize>, NodeId)> = main
        .element_children(body)
        .map(|block| (block_reviewer(&main, block, revised), block))
        .collect();

    let mut out: Vec<(bool, XmlFragment)> = Vec::new();
    let mut i = 0;
    while i < blocks.len() {
        let reviewer = blocks[i].0;
        let j = (i..blocks.len()).find(|&j| blocks[j].0 != reviewer).unwrap_or(blocks.len());
        let fragments = blocks[i..j].iter().map(|&(_, id)| XmlFragment::extract(&main, id));
        match reviewer.and_then(|r| revised.get(r)) {
            Some(info) => push_block(&mut out, true, reviewer_table(info, fragments.collect())),
            None => fragments.for_each(|f| push_block(&mut out, false, f)),
        }
        i = j;
    }

    main.clear_children(body);
    for (_, block) in &out {
        block.graft(&mut main, body);
    }
    let main_path = document.main_part().to_string();
    document.package_mut().put_xml_part(&main_path, &main)?;
    debug!(
        "wrapped {} reviewer blocks",
        out.iter().filter(|(wrapper, _)| *wrapper).count()
    );
    Ok(())
}

/// The one reviewer whose revisions a paragraph or table carries.
fn block_reviewer(main: &XmlDocument, block: NodeId, revised: &[WmlRevisedDocumentInfo]) -> Option<usize> {
    if !(main.is_named(block, W::NS, "p") || main.is_named(block, W::NS, "tbl")) {
        return None;
    }
    let mut reviewers = HashSet::new();
    for node in main.descendants(block) {
        if main.is_named(node, W::NS, "sectPr") {
            return None;
        }
        let is_revision = main
            .name(node)
            .is_some_and(|n| n.in_namespace(W::NS) && REVISION_ELEMENTS.contains(n.local_name.as_str()));
        let author = main.attribute(node, &W::author()).filter(|_| is_revision);
        if let Some(r) = author.and_then(|a| revised.iter().position(|info| info.revisor == a)) {
            reviewers.insert(r);
        }
    }
    match reviewers.len() {
        1 => reviewers.into_iter().next(),
        _ => None,
    }
}

fn push_block(out: &mut Vec<(bool, XmlFragment)>, wrapper: bool, block: XmlFragment) {
    if let Some((last_wrapper, last)) = out.last() {
        // Word joins adjacent tables.
        if (wrapper || *last_wrapper) && last.is(W::NS, "tbl") && block.is(W::NS, "tbl") {
            out.push((false, XmlFragment::element(W::p())));
        }
    }
    out.push((wrapper, block));
}

fn reviewer_table(info: &WmlRevisedDocumentInfo, blocks: Vec<XmlFragment>) -> XmlFragment {
    let width = |name| XmlFragment::element(name).with_attr(W::w(), "5000").with_attr(W::type_(), "pct");
    let caption = XmlFragment::element(W::p()).with_child(
        XmlFragment::element(W::r())
            .with_child(XmlFragment::element(W::rPr()).with_child(XmlFragment::element(W::b())))
            .with_child(text_element(&info.revisor, false)),
    );
    let shading = XmlFragment::element(W::shd())
        .with_attr(W::val(), "clear")
        .with_attr(W::color(), "auto")
        .with_attr(W::fill(), &info.color.hex());

    let mut cell = XmlFragment::element(W::tc())
        .with_child(XmlFragment::element(W::tcPr()).with_child(width(W::tcW())).with_child(shading))
        .with_child(caption);
    let ends_with_table = blocks.last().is_some_and(|b| b.is(W::NS, "tbl"));
    cell.children.extend(blocks);
    if ends_with_table {
        cell.children.push(XmlFragment::element(W::p()));
    }

    XmlFragment::element(W::tbl())
        .with_child(XmlFragment::element(W::tblPr()).with_child(width(W::tblW())))
        .with_child(
            XmlFragment::element(W::tblGrid()).with_child(XmlFragment::element(W::gridCol()).with_attr(W::w(), "9360")),
        )
        .with_child(XmlFragment::element(W::tr()).with_child(cell))
}

fn summaries(revised: &[WmlRevisedDocumentInfo], revisions: &[Revision]) -> Vec<ReviewerSummary> {
    revised
        .iter()
        .map(|info| ReviewerSummary {
            revisor: info.revisor.clone(),
            color: info.color,
            revisions: revisions
                .iter()
                .filter(|r| r.author == info.revisor && r.color == Some(info.color))
                .count(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wml::revisions::get_revisions;
    use crate::wml::validate::validate_document;
    use pretty_assertions::assert_eq;

    fn doc(paragraphs: &[&str]) -> WmlDocument {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        WmlDocument::from_main_xml(&format!(
            r#"<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W::NS,
            body
        ))
        .unwrap()
    }

    fn reviewer(document: WmlDocument, name: &str, color: Rgb) -> WmlRevisedDocumentInfo {
        WmlRevisedDocumentInfo::new(document, name, color)
    }

    fn settings() -> WmlComparerSettings {
        WmlComparerSettings::default().with_date_time("2024-05-01T00:00:00Z")
    }

    fn summary(revisions: &[Revision]) -> Vec<(RevisionKind, String, String)> {
        revisions
            .iter()
            .map(|r| (r.kind, r.author.clone(), r.text.clone()))
            .collect()
    }

    const RED: Rgb = Rgb(0xFF, 0, 0);
    const BLUE: Rgb = Rgb(0, 0, 0xFF);

    #[test]
    fn disjoint_edits_are_united() {
        let original = doc(&["alpha beta gamma", "one two three"]);
        let result = consolidate(
            &original,
            &[
                reviewer(doc(&["alpha delta gamma", "one two three"]), "Ann", RED),
                reviewer(doc(&["alpha beta gamma", "one two four"]), "Bob", BLUE),
            ],
            &settings(),
        )
        .unwrap();

        assert_eq!(
            summary(&result.revisions),
            vec![
                (RevisionKind::Deleted, "Ann".to_string(), "beta".to_string()),
                (RevisionKind::Inserted, "Ann".to_string(), "delta".to_string()),
                (RevisionKind::Deleted, "Bob".to_string(), "three".to_string()),
                (RevisionKind::Inserted, "Bob".to_string(), "four".to_string()),
            ]
        );
        assert_eq!(result.revisions[0].color, Some(RED));
        assert_eq!(result.per_reviewer[1].revisions, 2);
        assert!(result.failures.is_empty());
        assert!(result.suppressed.is_empty());
    }

    #[test]
    fn identical_edits_are_emitted_once() {
        let original = doc(&["alpha beta gamma"]);
        let same = || doc(&["alpha delta gamma"]);
        let result = consolidate(
            &original,
            &[reviewer(same(), "Ann", RED), reviewer(same(), "Bob", BLUE)],
            &settings(),
        )
        .unwrap();

        assert_eq!(
            summary(&result.revisions),
            vec![
                (RevisionKind::Deleted, "Ann".to_string(), "beta".to_string()),
                (RevisionKind::Inserted, "Ann".to_string(), "delta".to_string()),
            ]
        );
        let suppressed: Vec<_> = result.suppressed.iter().map(|s| (s.revisor.as_str(), s.kind)).collect();
        assert_eq!(
            suppressed,
            vec![("Bob", RevisionKind::Deleted), ("Bob", RevisionKind::Inserted)]
        );
        assert_eq!(result.per_reviewer[1].revisions, 0);
        assert_eq!(result.document.main_xml().unwrap().matches("<w:ins ").count(), 1);
    }

    #[test]
    fn overlapping_edits_keep_each_reviewer() {
        let original = doc(&["alpha beta gamma"]);
        let ann = || reviewer(doc(&["alpha delta gamma"]), "Ann", RED);
        let bob = || reviewer(doc(&["alpha zeta gamma"]), "Bob", BLUE);

        let forward = consolidate(&original, &[ann(), bob()], &settings()).unwrap();
        assert_eq!(
            summary(&forward.revisions),
            vec![
                (RevisionKind::Deleted, "Ann".to_string(), "beta".to_string()),
                (RevisionKind::Inserted, "Ann".to_string(), "delta".to_string()),
                (RevisionKind::Deleted, "Bob".to_string(), "beta".to_string()),
                (RevisionKind::Inserted, "Bob".to_string(), "zeta".to_string()),
            ]
        );
        assert!(forward.suppressed.is_empty());
        assert!(validate_document(&forward.document).unwrap().is_empty());

        let backward = consolidate(&original, &[bob(), ann()], &settings()).unwrap();
        let sorted = |revisions: &[Revision]| {
            let mut keys: Vec<_> = summary(revisions)
                .into_iter()
                .map(|(kind, author, text)| (format!("{:?}", kind), author, text))
                .collect();
            keys.sort();
            keys
        };
        assert_eq!(sorted(&backward.revisions), sorted(&forward.revisions));
    }

    #[test]
    fn reviewer_blocks_are_shaded_and_captioned() {
        let original = doc(&["alpha beta gamma", "one two three"]);
        let infos = [reviewer(doc(&["alpha delta gamma", "one two three"]), "Ann", Rgb(0xC0, 0x39, 0x2B))];

        let result = consolidate(&original, &infos, &settings()).unwrap();
        let xml = result.document.main_xml().unwrap();
        assert!(xml.contains(r#"w:fill="C0392B""#));
        assert!(xml.contains(">Ann</w:t>"));
        assert_eq!(xml.matches("<w:tc>").count(), 1);
        assert!(validate_document(&result.document).unwrap().is_empty());
        assert_eq!(summary(&get_revisions(&result.document).unwrap()), summary(&result.revisions));

        let inline = WmlComparerConsolidateSettings {
            consolidate_with_table: false,
            ..Default::default()
        };
        let result = consolidate_with_settings(&original, &infos, &settings(), &inline).unwrap();
        let xml = result.document.main_xml().unwrap();
        assert!(!xml.contains("C0392B"));
        assert!(!xml.contains("<w:tbl"));
    }

    #[test]
    fn a_block_changed_by_two_reviewers_stays_inline() {
        let original = doc(&["alpha beta gamma"]);
        let result = consolidate(
            &original,
            &[
                reviewer(doc(&["alpha delta gamma"]), "Ann", RED),
                reviewer(doc(&["alpha beta omega"]), "Bob", BLUE),
            ],
            &settings(),
        )
        .unwrap();
        assert_eq!(result.revisions.len(), 4);
        assert!(!result.document.main_xml().unwrap().contains("<w:tbl"));
    }

    #[test]
    fn a_failing_reviewer_is_reported_and_skipped() {
        let original = doc(&["alpha beta"]);
        let broken = WmlDocument::from_main_xml(&format!(
            r#"<w:document xmlns:w="{}" xmlns:r="urn:r"><w:body><w:altChunk r:id="rId1"/></w:body></w:document>"#,
            W::NS
        ))
        .unwrap();
        let infos = [
            reviewer(broken, "Ann", RED),
            reviewer(doc(&["alpha gamma"]), "Bob", BLUE),
        ];

        let result = consolidate(&original, &infos, &settings()).unwrap();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].revisor, "Ann");
        assert!(result.revisions.iter().all(|r| r.author == "Bob"));
        assert_eq!(result.revisions.len(), 2);

        let strict = WmlComparerConsolidateSettings {
            fail_fast: true,
            ..Default::default()
        };
        let err = consolidate_with_settings(&original, &infos, &settings(), &strict).unwrap_err();
        assert!(matches!(err, CompareError::UnsupportedContent { .. }));
    }

    #[test]
    fn no_reviewers_leaves_the_original() {
        let original = doc(&["alpha"]);
        let result = consolidate(&original, &[], &settings()).unwrap();
        assert!(result.revisions.is_empty());
        assert_eq!(result.document, original);
    }

    #[test]
    fn a_move_losing_its_source_becomes_an_insertion() {
        let mut stream = vec![
            OutAtom { side: 0, index: 0, status: Status::Deleted, attribution: 0, other: None },
            OutAtom { side: 2, index: 0, status: Status::MovedTo(4), attribution: 1, other: None },
        ];
        pair_moves(&mut stream);
        assert_eq!(stream[1].status, Status::Inserted);
    }
}
