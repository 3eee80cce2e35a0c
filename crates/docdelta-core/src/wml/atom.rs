use super::content::{ChangeKind, ContainerKind};
use super::document::{NoteKind, PartKind};
use super::settings::WmlComparerSettings;
use crate::hash::sha1_hash_parts;
use crate::util::{fold_case, Hashable};
use crate::xml::namespaces::W;
use crate::xml::XmlFragment;
use indextree::NodeId;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One container an atom sits in, with enough of the element to rebuild it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ancestor {
    /// Stable identity, unique per side, part and position.
    pub unid: String,
    pub kind: ContainerKind,
    pub side: usize,
    pub part: PartKind,
    /// The element with its property children but without content.
    pub shell: Arc<XmlFragment>,
}

impl Ancestor {
    pub fn new(side: usize, part: PartKind, path: &str, kind: ContainerKind, shell: XmlFragment) -> Self {
        let name = format!("{}|{}|{}", side, part, path);
        Self {
            unid: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
            kind,
            side,
            part,
            shell: Arc::new(shell),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomContent {
    /// A word fragment or a single separator character.
    Text(String),
    ParagraphMark,
    /// Any other indivisible object, keyed by its content identity.
    Element { name: String, key: String },
    /// `note` is the unid of the referenced note's container on the atom's side.
    NoteReference { kind: NoteKind, note: String },
}

/// Tracked-change markup present in an input around an atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExistingRevision {
    pub kind: ChangeKind,
    pub author: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomSource {
    pub side: usize,
    pub part: PartKind,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct ComparisonAtom {
    pub content: AtomContent,
    pub hash: String,
    /// Outermost first.
    pub ancestors: Vec<Arc<Ancestor>>,
    pub source: AtomSource,
    /// `w:rPr` of the run for leaves, `w:pPr` for paragraph marks.
    pub properties: Option<Arc<XmlFragment>>,
    /// The leaf element for non-text content.
    pub element: Option<Arc<XmlFragment>>,
    /// False for objects that sit directly in a paragraph (math, alternate content).
    pub in_run: bool,
    /// Outermost first.
    pub existing: Vec<ExistingRevision>,
}

impl ComparisonAtom {
    pub fn is_paragraph_mark(&self) -> bool {
        matches!(self.content, AtomContent::ParagraphMark)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            AtomContent::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_separator(&self, settings: &WmlComparerSettings) -> bool {
        self.text()
            .is_some_and(|t| t.chars().count() == 1 && t.chars().all(|c| settings.is_word_separator(c)))
    }

    pub fn is_word_text(&self, settings: &WmlComparerSettings) -> bool {
        self.text().is_some() && !self.is_separator(settings)
    }

    /// Innermost ancestor of `kind`.
    pub fn nearest(&self, kind: ContainerKind) -> Option<&Arc<Ancestor>> {
        self.ancestors.iter().rev().find(|a| a.kind == kind)
    }

    /// Properties compared for formatting changes, without change-tracking children.
    pub fn properties_signature(&self) -> String {
        properties_signature(self.properties.as_deref())
    }

    /// Plain text used in revision reports.
    pub fn display_text(&self) -> String {
        match &self.content {
            AtomContent::Text(t) => t.clone(),
            AtomContent::Element { name, .. } if name == "tab" => "\t".to_string(),
            AtomContent::Element { name, .. } if name == "br" || name == "cr" => "\n".to_string(),
            AtomContent::Element { name, key } if name == "instrText" => key.clone(),
            _ => String::new(),
        }
    }

    /// A copy of a text atom carrying `text` instead, for re-segmentation.
    pub fn with_text(&self, text: &str, settings: &WmlComparerSettings) -> Self {
        let content = AtomContent::Text(text.to_string());
        Self {
            hash: content_hash(&content, settings),
            content,
            ..self.clone()
        }
    }
}

impl Hashable for ComparisonAtom {
    fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for ComparisonAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            AtomContent::Text(t) => write!(f, "{:?}", t)?,
            AtomContent::ParagraphMark => f.write_str("¶")?,
            AtomContent::Element { name, .. } => write!(f, "<{}>", name)?,
            AtomContent::NoteReference { kind, .. } => write!(f, "<{}>", kind.reference())?,
        }
        for existing in &self.existing {
            write!(f, " [{:?} by {}]", existing.kind, existing.author)?;
        }
        Ok(())
    }
}

/// Text as compared: case folded and spaces conflated per settings.
pub fn normalize_text(text: &str, settings: &WmlComparerSettings) -> String {
    let text = if settings.conflate_breaking_and_nonbreaking_spaces {
        text.replace('\u{00A0}', " ")
    } else {
        text.to_string()
    };
    if settings.case_insensitive {
        fold_case(&text, settings.culture_info.as_deref())
    } else {
        text
    }
}

/// Content-only hash; formatting, identities and existing markup are excluded.
pub fn content_hash(content: &AtomContent, settings: &WmlComparerSettings) -> String {
    match content {
        AtomContent::Text(t) => sha1_hash_parts(["t", normalize_text(t, settings).as_str()]),
        AtomContent::ParagraphMark => sha1_hash_parts(["p"]),
        AtomContent::Element { name, key } => sha1_hash_parts(["e", name.as_str(), key.as_str()]),
        AtomContent::NoteReference { kind, .. } => sha1_hash_parts(["n", kind.element()]),
    }
}

pub fn properties_signature(properties: Option<&XmlFragment>) -> String {
    let Some(props) = properties else {
        return String::new();
    };
    let mut props = props.clone();
    props
        .children
        .retain(|c| !(c.is(W::NS, "rPrChange") || c.is(W::NS, "pPrChange")));
    if props.children.is_empty() {
        return String::new();
    }
    props.canonical()
}
