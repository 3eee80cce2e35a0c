//! Builders for tracked-change markup and schema-ordered property edits.

use super::content::ChangeKind;
use crate::xml::namespaces::{W, XML_NS};
use crate::xml::{XName, XmlFragment, XmlNodeData};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Revision ids for one output document.
#[derive(Debug)]
pub(crate) struct RevisionIds {
    next: u32,
}

impl RevisionIds {
    pub(crate) fn new() -> Self {
        Self { next: 0 }
    }

    pub(crate) fn next(&mut self) -> String {
        self.next += 1;
        self.next.to_string()
    }
}

/// Author and date written on a revision element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Stamp {
    pub author: String,
    pub date: Option<String>,
}

impl Stamp {
    pub(crate) fn new(author: &str, date: Option<&str>) -> Self {
        Self {
            author: author.to_string(),
            date: date.map(str::to_string),
        }
    }
}

/// `<name w:id w:author w:date/>`.
pub(crate) fn revision_element(name: XName, id: &str, stamp: &Stamp) -> XmlFragment {
    let mut element = XmlFragment::element(name)
        .with_attr(W::id(), id)
        .with_attr(W::author(), &stamp.author);
    if let Some(date) = &stamp.date {
        element.set_attribute(W::date(), date);
    }
    element
}

/// Start and end of the range a move wrapper sits in.
pub(crate) fn move_range(
    kind: ChangeKind,
    ids: &mut RevisionIds,
    move_name: &str,
    stamp: &Stamp,
) -> (XmlFragment, XmlFragment) {
    let (start, end) = match kind {
        ChangeKind::MovedFrom => (W::moveFromRangeStart(), W::moveFromRangeEnd()),
        _ => (W::moveToRangeStart(), W::moveToRangeEnd()),
    };
    let id = ids.next();
    let start = revision_element(start, &id, stamp).with_attr(W::name(), move_name);
    let end = XmlFragment::element(end).with_attr(W::id(), &id);
    (start, end)
}

pub(crate) static REVISION_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ins",
        "del",
        "moveFrom",
        "moveTo",
        "moveFromRangeStart",
        "moveFromRangeEnd",
        "moveToRangeStart",
        "moveToRangeEnd",
        "rPrChange",
        "pPrChange",
        "trPrChange",
        "tcPrChange",
        "tblPrChange",
        "tblPrExChange",
        "tblGridChange",
        "sectPrChange",
        "numberingChange",
        "cellIns",
        "cellDel",
        "cellMerge",
    ]
    .into_iter()
    .collect()
});

pub(crate) fn is_revision_element(fragment: &XmlFragment) -> bool {
    fragment
        .name()
        .is_some_and(|n| n.in_namespace(W::NS) && REVISION_ELEMENTS.contains(n.local_name.as_str()))
}

/// Gives every revision element in `fragment` an id from `ids`. Elements
/// that shared an id (range starts and ends) still share one.
pub(crate) fn renumber(fragment: &mut XmlFragment, ids: &mut RevisionIds) {
    let mut mapping: HashMap<String, String> = HashMap::new();
    fragment.walk_mut(&mut |el| {
        if !is_revision_element(el) {
            return;
        }
        let Some(old) = el.attribute(&W::id()).map(str::to_string) else {
            return;
        };
        let new = mapping.entry(old).or_insert_with(|| ids.next()).clone();
        el.set_attribute(W::id(), &new);
    });
}

/// `w:t`, or `w:delText` for removed content.
pub(crate) fn text_element(text: &str, removed: bool) -> XmlFragment {
    let name = if removed { W::delText() } else { W::t() };
    let mut element = XmlFragment::element(name);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        element.set_attribute(XName::new(XML_NS, "space"), "preserve");
    }
    element.with_child(XmlFragment::text(text))
}

/// Renames run content that has a removed form.
pub(crate) fn as_removed(mut fragment: XmlFragment) -> XmlFragment {
    rename(&mut fragment, &[("t", W::delText()), ("instrText", W::delInstrText())]);
    fragment
}

/// Inverse of [`as_removed`].
pub(crate) fn as_restored(mut fragment: XmlFragment) -> XmlFragment {
    rename(&mut fragment, &[("delText", W::t()), ("delInstrText", W::instrText())]);
    fragment
}

fn rename(fragment: &mut XmlFragment, pairs: &[(&str, XName)]) {
    let Some(target) = pairs.iter().find(|(from, _)| fragment.is(W::NS, from)).map(|(_, to)| to) else {
        return;
    };
    let attributes = fragment.node.attributes().map(|a| a.to_vec()).unwrap_or_default();
    fragment.node = XmlNodeData::element_with_attrs(target.clone(), attributes);
}

/// Inserts `child` before the first existing child named in `before`
/// (W namespace), or last.
pub(crate) fn insert_before(parent: &mut XmlFragment, child: XmlFragment, before: &[&str]) {
    let at = parent
        .children
        .iter()
        .position(|c| before.iter().any(|name| c.is(W::NS, name)))
        .unwrap_or(parent.children.len());
    parent.children.insert(at, child);
}

/// The `local` W child of `parent`, created at its schema position if missing.
pub(crate) fn ensure_child<'a>(parent: &'a mut XmlFragment, local: &str, before: &[&str]) -> &'a mut XmlFragment {
    let position = parent.children.iter().position(|c| c.is(W::NS, local));
    let at = match position {
        Some(at) => at,
        None => {
            let at = parent
                .children
                .iter()
                .position(|c| before.iter().any(|name| c.is(W::NS, name)))
                .unwrap_or(parent.children.len());
            parent
                .children
                .insert(at, XmlFragment::element(XName::new(W::NS, local)));
            at
        }
    };
    &mut parent.children[at]
}

/// Paragraph properties compared for `w:pPrChange`: mark formatting,
/// section properties and earlier changes are not paragraph formatting.
pub(crate) fn paragraph_format(ppr: Option<&XmlFragment>) -> Option<XmlFragment> {
    let mut ppr = ppr?.clone();
    ppr.children
        .retain(|c| !(c.is(W::NS, "rPr") || c.is(W::NS, "sectPr") || c.is(W::NS, "pPrChange")));
    (!ppr.children.is_empty()).then_some(ppr)
}

pub(crate) fn paragraph_format_signature(ppr: Option<&XmlFragment>) -> String {
    paragraph_format(ppr).map(|p| p.canonical()).unwrap_or_default()
}

/// Adds mark-level revision markers to the `w:rPr` of `ppr`. Markers
/// lead the run properties.
pub(crate) fn add_mark_markers(ppr: &mut XmlFragment, mut markers: Vec<XmlFragment>) {
    if markers.is_empty() {
        return;
    }
    let rpr = ensure_child(ppr, "rPr", &["sectPr", "pPrChange"]);
    let first_other = rpr
        .children
        .iter()
        .position(|c| c.name().and_then(ChangeKind::from_element).is_none())
        .unwrap_or(rpr.children.len());
    for (offset, marker) in markers.drain(..).enumerate() {
        rpr.children.insert(first_other + offset, marker);
    }
}

/// Records `old` as the previous paragraph formatting of `ppr`.
pub(crate) fn add_paragraph_change(ppr: &mut XmlFragment, old: Option<&XmlFragment>, id: &str, stamp: &Stamp) {
    let previous = paragraph_format(old).unwrap_or_else(|| XmlFragment::element(W::pPr()));
    ppr.children.retain(|c| !c.is(W::NS, "pPrChange"));
    ppr.children
        .push(revision_element(W::pPrChange(), id, stamp).with_child(previous));
}

/// `w:rPr` holding `new`, with `old` recorded as its previous formatting.
pub(crate) fn run_properties_with_change(
    new: Option<&XmlFragment>,
    old: Option<&XmlFragment>,
    id: &str,
    stamp: &Stamp,
) -> XmlFragment {
    let mut rpr = new.cloned().unwrap_or_else(|| XmlFragment::element(W::rPr()));
    rpr.children.retain(|c| !c.is(W::NS, "rPrChange"));
    let mut previous = old.cloned().unwrap_or_else(|| XmlFragment::element(W::rPr()));
    previous.children.retain(|c| !c.is(W::NS, "rPrChange"));
    rpr.children
        .push(revision_element(W::rPrChange(), id, stamp).with_child(previous));
    rpr
}

/// Marks a whole row as inserted or deleted in its `w:trPr`.
pub(crate) fn add_row_marker(row: &mut XmlFragment, marker: XmlFragment) {
    let trpr = ensure_child(row, "trPr", &["tc", "sdt", "customXml"]);
    insert_before(trpr, marker, &["trPrChange"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> Stamp {
        Stamp::new("Ann", Some("2024-01-01T00:00:00Z"))
    }

    #[test]
    fn text_keeps_edge_whitespace() {
        let t = text_element(" a", false);
        assert!(t.is(W::NS, "t"));
        assert_eq!(t.attribute(&XName::new(XML_NS, "space")), Some("preserve"));
        let d = text_element("a", true);
        assert!(d.is(W::NS, "delText"));
        assert_eq!(d.attribute(&XName::new(XML_NS, "space")), None);
    }

    #[test]
    fn removed_and_restored_forms() {
        let instr = XmlFragment::element(W::instrText()).with_child(XmlFragment::text(" PAGE "));
        let removed = as_removed(instr.clone());
        assert!(removed.is(W::NS, "delInstrText"));
        assert_eq!(as_restored(removed), instr);
        let tab = XmlFragment::element(W::tab());
        assert_eq!(as_removed(tab.clone()), tab);
    }

    #[test]
    fn mark_markers_lead_rpr_and_rpr_precedes_sectpr() {
        let mut ppr = XmlFragment::element(W::pPr())
            .with_child(XmlFragment::element(XName::new(W::NS, "jc")))
            .with_child(XmlFragment::element(W::sectPr()));
        add_mark_markers(&mut ppr, vec![revision_element(W::ins(), "1", &stamp())]);
        let names: Vec<&str> = ppr.children.iter().filter_map(|c| c.name()).map(|n| n.local_name.as_str()).collect();
        assert_eq!(names, vec!["jc", "rPr", "sectPr"]);
        assert!(ppr.child(W::NS, "rPr").unwrap().children[0].is(W::NS, "ins"));
    }

    #[test]
    fn paragraph_change_keeps_only_formatting() {
        let old = XmlFragment::element(W::pPr())
            .with_child(XmlFragment::element(XName::new(W::NS, "jc")).with_attr(W::val(), "left"))
            .with_child(XmlFragment::element(W::rPr()));
        let mut new = XmlFragment::element(W::pPr())
            .with_child(XmlFragment::element(XName::new(W::NS, "jc")).with_attr(W::val(), "center"));
        assert_ne!(paragraph_format_signature(Some(&old)), paragraph_format_signature(Some(&new)));

        add_paragraph_change(&mut new, Some(&old), "3", &stamp());
        let change = new.child(W::NS, "pPrChange").unwrap();
        assert_eq!(change.attribute(&W::author()), Some("Ann"));
        let previous = change.child(W::NS, "pPr").unwrap();
        assert_eq!(previous.children.len(), 1);
    }

    #[test]
    fn row_marker_goes_into_trpr_before_its_change() {
        let mut row = XmlFragment::element(W::tr()).with_child(XmlFragment::element(W::tblPrEx()));
        add_row_marker(&mut row, revision_element(W::del(), "1", &stamp()));
        assert!(row.children[1].is(W::NS, "trPr"));
        assert!(row.children[1].children[0].is(W::NS, "del"));
    }

    #[test]
    fn renumbering_keeps_range_pairs_together() {
        let mut ids = RevisionIds::new();
        ids.next();
        let mut p = XmlFragment::element(W::p())
            .with_child(XmlFragment::element(W::moveToRangeStart()).with_attr(W::id(), "7"))
            .with_child(XmlFragment::element(W::moveTo()).with_attr(W::id(), "8"))
            .with_child(XmlFragment::element(W::moveToRangeEnd()).with_attr(W::id(), "7"))
            .with_child(XmlFragment::element(W::footnoteReference()).with_attr(W::id(), "7"));
        renumber(&mut p, &mut ids);
        let ids_of: Vec<Option<&str>> = p.children.iter().map(|c| c.attribute(&W::id())).collect();
        assert_eq!(ids_of, vec![Some("2"), Some("3"), Some("2"), Some("7")]);
    }

    #[test]
    fn move_ranges_share_the_name() {
        let mut ids = RevisionIds::new();
        let (start, end) = move_range(ChangeKind::MovedTo, &mut ids, "move1", &stamp());
        assert!(start.is(W::NS, "moveToRangeStart"));
        assert_eq!(start.attribute(&W::name()), Some("move1"));
        assert_eq!(end.attribute(&W::id()), start.attribute(&W::id()));
        assert_eq!(ids.next(), "2");
    }
}
