//! The closed set of node kinds the decomposer understands.
//!
//! Every element met during traversal is classified once by name and by the
//! context it appears in; the walk itself never looks at element names.

use super::document::NoteKind;
use crate::xml::namespaces::W;
use crate::xml::XName;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;

/// Elements that structure content and are re-assembled around atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Note(NoteKind),
    Table,
    Row,
    Cell,
    Paragraph,
    TextBox,
    Hyperlink,
    Sdt,
    SmartTag,
    SimpleField,
    CustomXml,
    Bidi,
}

impl ContainerKind {
    pub fn label(self) -> &'static str {
        match self {
            ContainerKind::Note(NoteKind::Footnote) => "footnote",
            ContainerKind::Note(NoteKind::Endnote) => "endnote",
            ContainerKind::Table => "table",
            ContainerKind::Row => "row",
            ContainerKind::Cell => "cell",
            ContainerKind::Paragraph => "paragraph",
            ContainerKind::TextBox => "textbox",
            ContainerKind::Hyperlink => "hyperlink",
            ContainerKind::Sdt => "sdt",
            ContainerKind::SmartTag => "smart_tag",
            ContainerKind::SimpleField => "simple_field",
            ContainerKind::CustomXml => "custom_xml",
            ContainerKind::Bidi => "bidi",
        }
    }

    /// Context the container's children are read in.
    fn inner_context(self, outer: Context) -> Context {
        match self {
            ContainerKind::Note(_) | ContainerKind::Cell | ContainerKind::TextBox => Context::Block,
            ContainerKind::Table => Context::Table,
            ContainerKind::Row => Context::Row,
            ContainerKind::Paragraph => Context::Inline,
            ContainerKind::Sdt | ContainerKind::CustomXml => outer,
            ContainerKind::Hyperlink
            | ContainerKind::SmartTag
            | ContainerKind::SimpleField
            | ContainerKind::Bidi => Context::Inline,
        }
    }
}

/// Tracked-change markup, both pre-existing and newly produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Deleted,
    MovedFrom,
    MovedTo,
}

impl ChangeKind {
    pub fn from_element(name: &XName) -> Option<Self> {
        if !name.in_namespace(W::NS) {
            return None;
        }
        match name.local_name.as_str() {
            "ins" => Some(ChangeKind::Inserted),
            "del" => Some(ChangeKind::Deleted),
            "moveFrom" => Some(ChangeKind::MovedFrom),
            "moveTo" => Some(ChangeKind::MovedTo),
            _ => None,
        }
    }

    pub fn element(self) -> XName {
        match self {
            ChangeKind::Inserted => W::ins(),
            ChangeKind::Deleted => W::del(),
            ChangeKind::MovedFrom => W::moveFrom(),
            ChangeKind::MovedTo => W::moveTo(),
        }
    }

    /// True when accepting the change removes the content.
    pub fn removes(self) -> bool {
        matches!(self, ChangeKind::Deleted | ChangeKind::MovedFrom)
    }

    /// Wrapper nesting order: insertions outermost, deletions innermost.
    pub fn nesting_rank(self) -> u8 {
        match self {
            ChangeKind::Inserted => 0,
            ChangeKind::MovedTo => 1,
            ChangeKind::MovedFrom => 2,
            ChangeKind::Deleted => 3,
        }
    }

    /// Schema order of mark-level markers inside `w:rPr` / `w:trPr`.
    pub fn marker_rank(self) -> u8 {
        match self {
            ChangeKind::Inserted => 0,
            ChangeKind::Deleted => 1,
            ChangeKind::MovedFrom => 2,
            ChangeKind::MovedTo => 3,
        }
    }
}

/// Where an element sits; the same name can mean different things in
/// different places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Body, cell, note or text box content.
    Block,
    /// Children of `w:tbl`.
    Table,
    /// Children of `w:tr`.
    Row,
    /// Paragraph content outside runs.
    Inline,
    /// Children of `w:r`.
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container(ContainerKind, Context),
    Run,
    Text,
    Leaf,
    /// Property elements consumed by their owner (`w:pPr`, `w:rPr`, `w:tblPr`, ...).
    Properties,
    RevisionWrapper(ChangeKind),
    Ignorable,
    Unsupported,
}

static IGNORABLE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bookmarkStart",
        "bookmarkEnd",
        "proofErr",
        "lastRenderedPageBreak",
        "commentRangeStart",
        "commentRangeEnd",
        "commentReference",
        "annotationRef",
        "permStart",
        "permEnd",
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
    ]
    .into_iter()
    .collect()
});

static RUN_LEAVES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "br",
        "cr",
        "tab",
        "ptab",
        "sym",
        "noBreakHyphen",
        "softHyphen",
        "dayLong",
        "dayShort",
        "monthLong",
        "monthShort",
        "yearLong",
        "yearShort",
        "pgNum",
        "fldChar",
        "instrText",
        "delInstrText",
        "drawing",
        "pict",
        "object",
        "ruby",
        "contentPart",
        "footnoteReference",
        "endnoteReference",
        "footnoteRef",
        "endnoteRef",
        "separator",
        "continuationSeparator",
    ]
    .into_iter()
    .collect()
});

static PROPERTIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "pPr", "rPr", "tblPr", "tblGrid", "tblPrEx", "trPr", "tcPr", "sdtPr", "sdtEndPr",
        "sectPr", "smartTagPr", "customXmlPr",
    ]
    .into_iter()
    .collect()
});

/// Classifies `name` met in `context`.
pub fn classify(name: &XName, context: Context) -> NodeKind {
    if !name.in_namespace(W::NS) {
        return match context {
            Context::Inline | Context::Run => NodeKind::Leaf,
            _ => NodeKind::Unsupported,
        };
    }

    let local = name.local_name.as_str();
    if IGNORABLE.contains(local) {
        return NodeKind::Ignorable;
    }
    if PROPERTIES.contains(local) {
        return NodeKind::Properties;
    }

    let container = |kind: ContainerKind| NodeKind::Container(kind, kind.inner_context(context));
    match (context, local) {
        (Context::Block, "p") => container(ContainerKind::Paragraph),
        (Context::Block, "tbl") => container(ContainerKind::Table),
        (Context::Table, "tr") => container(ContainerKind::Row),
        (Context::Row, "tc") => container(ContainerKind::Cell),
        (Context::Block | Context::Table | Context::Row | Context::Inline, "sdt") => {
            container(ContainerKind::Sdt)
        }
        (Context::Block | Context::Table | Context::Row | Context::Inline, "customXml") => {
            container(ContainerKind::CustomXml)
        }
        (Context::Inline, "r") => NodeKind::Run,
        (Context::Inline, "hyperlink") => container(ContainerKind::Hyperlink),
        (Context::Inline, "smartTag") => container(ContainerKind::SmartTag),
        (Context::Inline, "fldSimple") => container(ContainerKind::SimpleField),
        (Context::Inline, "dir" | "bdo") => container(ContainerKind::Bidi),
        (Context::Inline, _) => match ChangeKind::from_element(name) {
            Some(kind) => NodeKind::RevisionWrapper(kind),
            None => NodeKind::Unsupported,
        },
        (Context::Run, "t" | "delText") => NodeKind::Text,
        (Context::Run, leaf) if RUN_LEAVES.contains(leaf) => NodeKind::Leaf,
        _ => NodeKind::Unsupported,
    }
}
