use super::settings::WmlComparerSettings;
use crate::error::{CompareError, Result};
use crate::package::{
    content_type_values, relationship_types, relative_target, resolve_target, ContentTypes, CoreProperties,
    OoxmlPackage, Relationships, TargetMode,
};
use crate::xml::namespaces::W;
use crate::xml::{parser, XmlDocument};
use indextree::NodeId;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const DEFAULT_AUTHOR: &str = "docdelta";

/// The three parts the comparer reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Main,
    Footnotes,
    Endnotes,
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PartKind::Main => "main",
            PartKind::Footnotes => "footnotes",
            PartKind::Endnotes => "endnotes",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    pub fn part(self) -> PartKind {
        match self {
            NoteKind::Footnote => PartKind::Footnotes,
            NoteKind::Endnote => PartKind::Endnotes,
        }
    }

    /// Local name of the note element (`footnote` / `endnote`).
    pub fn element(self) -> &'static str {
        match self {
            NoteKind::Footnote => "footnote",
            NoteKind::Endnote => "endnote",
        }
    }

    /// Local name of the part's root element.
    pub fn root_element(self) -> &'static str {
        match self {
            NoteKind::Footnote => "footnotes",
            NoteKind::Endnote => "endnotes",
        }
    }

    pub fn reference(self) -> &'static str {
        match self {
            NoteKind::Footnote => "footnoteReference",
            NoteKind::Endnote => "endnoteReference",
        }
    }

    fn relationship_type(self) -> &'static str {
        match self {
            NoteKind::Footnote => relationship_types::FOOTNOTES,
            NoteKind::Endnote => relationship_types::ENDNOTES,
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            NoteKind::Footnote => content_type_values::WORD_FOOTNOTES,
            NoteKind::Endnote => content_type_values::WORD_ENDNOTES,
        }
    }

    pub fn from_reference(local_name: &str) -> Option<Self> {
        match local_name {
            "footnoteReference" => Some(NoteKind::Footnote),
            "endnoteReference" => Some(NoteKind::Endnote),
            _ => None,
        }
    }

    pub const ALL: [NoteKind; 2] = [NoteKind::Footnote, NoteKind::Endnote];
}

/// A WordprocessingML package. Inputs are never mutated by the comparer.
#[derive(Debug, Clone, PartialEq)]
pub struct WmlDocument {
    package: OoxmlPackage,
    main_part: String,
}

impl WmlDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(OoxmlPackage::open(bytes)?)
    }

    pub fn from_package(package: OoxmlPackage) -> Result<Self> {
        let main_part = package.main_document_part()?;
        Ok(Self { package, main_part })
    }

    /// Create a minimal WML document package from main XML content (useful for testing)
    pub fn from_main_xml(main_xml: &str) -> Result<Self> {
        // Fail at the boundary rather than on first use.
        parser::parse(main_xml)?;

        let main_part = "word/document.xml";
        let mut package = OoxmlPackage::new();

        let mut content_types = ContentTypes::new();
        content_types.set_content_type(main_part, content_type_values::WORD_DOCUMENT);
        package.put_content_types(&content_types)?;

        let mut package_rels = Relationships::default();
        package_rels.add(relationship_types::OFFICE_DOCUMENT, main_part, TargetMode::Internal);
        package.put_relationships("", &package_rels)?;

        package.set_part(main_part, main_xml.as_bytes().to_vec());
        Self::from_package(package)
    }

    /// Adds (or replaces) the footnotes/endnotes part, wiring up the
    /// relationship and content type.
    pub fn with_notes_xml(mut self, kind: NoteKind, xml: &str) -> Result<Self> {
        parser::parse(xml)?;
        let path = self.add_notes_part(kind)?;
        self.package.set_part(&path, xml.as_bytes().to_vec());
        Ok(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.save()
    }

    pub fn package(&self) -> &OoxmlPackage {
        &self.package
    }

    pub(crate) fn package_mut(&mut self) -> &mut OoxmlPackage {
        &mut self.package
    }

    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    pub fn main_document(&self) -> Result<XmlDocument> {
        self.package.get_xml_part(&self.main_part)
    }

    /// The main document part as XML text.
    pub fn main_xml(&self) -> Result<String> {
        let bytes = self
            .package
            .get_part(&self.main_part)
            .ok_or_else(|| self.missing(&self.main_part))?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|e| CompareError::XmlParse {
            message: e.to_string(),
            location: self.main_part.clone(),
        })
    }

    pub fn notes_part(&self, kind: NoteKind) -> Result<Option<String>> {
        self.package
            .related_part(&self.main_part, kind.relationship_type())
    }

    pub fn part_path(&self, part: PartKind) -> Result<Option<String>> {
        match part {
            PartKind::Main => Ok(Some(self.main_part.clone())),
            PartKind::Footnotes => self.notes_part(NoteKind::Footnote),
            PartKind::Endnotes => self.notes_part(NoteKind::Endnote),
        }
    }

    pub fn core_properties(&self) -> CoreProperties {
        self.package.get_core_properties()
    }

    /// Author for new revisions: the explicit setting, then the document's
    /// `cp:lastModifiedBy`, then `dc:creator`.
    pub fn revision_author(&self, settings: &WmlComparerSettings) -> String {
        if let Some(author) = &settings.author_for_revisions {
            return author.clone();
        }
        let core = self.core_properties();
        core.last_modified_by
            .or(core.creator)
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string())
    }

    /// Date for new revisions: the explicit setting, then `dcterms:modified`,
    /// then the current time.
    pub fn revision_date(&self, settings: &WmlComparerSettings) -> String {
        if let Some(date) = &settings.date_time_for_revisions {
            return date.clone();
        }
        self.core_properties()
            .modified
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())
    }

    /// Parses the parts the comparer works on.
    pub fn snapshot(&self) -> Result<DocumentSnapshot<'_>> {
        let main = self.main_document()?;
        let body = find_document_body(&main)
            .ok_or_else(|| CompareError::malformed(&self.main_part, "/document", "missing w:body"))?;

        let mut notes = HashMap::new();
        for kind in NoteKind::ALL {
            if let Some(path) = self.notes_part(kind)? {
                let xml = self.package.get_xml_part(&path)?;
                notes.insert(kind, NotesPart::index(kind, path, xml));
            }
        }

        Ok(DocumentSnapshot {
            document: self,
            main,
            body,
            notes,
        })
    }

    /// Adds a relationship from `source` to `target` plus a content type
    /// override, unless the relationship already exists.
    pub(crate) fn register_part(
        &mut self,
        source: &str,
        target: &str,
        rel_type: &str,
        content_type: &str,
    ) -> Result<()> {
        let mut rels = self.package.relationships(source)?;
        let relative = relative_target(source, target);
        let exists = rels
            .iter()
            .any(|r| r.rel_type == rel_type && resolve_target(source, &r.target) == target);
        if !exists {
            rels.add(rel_type, &relative, TargetMode::Internal);
            self.package.put_relationships(source, &rels)?;
        }
        let mut content_types = self.package.content_types()?;
        content_types.set_content_type(target, content_type);
        self.package.put_content_types(&content_types)
    }

    pub(crate) fn add_notes_part(&mut self, kind: NoteKind) -> Result<String> {
        if let Some(path) = self.notes_part(kind)? {
            return Ok(path);
        }
        let dir = self.main_part.rsplit_once('/').map(|(d, _)| d).unwrap_or("word");
        let path = format!("{}/{}.xml", dir, kind.root_element());
        let main = self.main_part.clone();
        self.register_part(&main, &path, kind.relationship_type(), kind.content_type())?;
        Ok(path)
    }

    fn missing(&self, part: &str) -> CompareError {
        CompareError::MissingPart {
            part_path: part.to_string(),
            document_type: "Word".to_string(),
        }
    }
}

/// A parsed footnotes or endnotes part with its notes indexed by `w:id`.
#[derive(Debug, Clone)]
pub struct NotesPart {
    pub kind: NoteKind,
    pub path: String,
    pub xml: XmlDocument,
    by_id: HashMap<String, NodeId>,
}

impl NotesPart {
    fn index(kind: NoteKind, path: String, xml: XmlDocument) -> Self {
        let mut by_id = HashMap::new();
        if let Some(root) = xml.root() {
            for note in xml.element_children(root) {
                if !xml.is_named(note, W::NS, kind.element()) {
                    continue;
                }
                if let Some(id) = xml.attribute(note, &W::id()) {
                    by_id.insert(id.to_string(), note);
                }
            }
        }
        Self { kind, path, xml, by_id }
    }

    pub fn note(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    /// Separator and continuation notes carry a `w:type`; they are never
    /// referenced from content.
    pub fn is_special(&self, note: NodeId) -> bool {
        self.xml
            .attribute(note, &W::type_())
            .is_some_and(|t| t != "normal")
    }

    pub fn special_notes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.xml
            .root()
            .into_iter()
            .flat_map(|root| self.xml.element_children(root))
            .filter(|&n| self.xml.is_named(n, W::NS, self.kind.element()) && self.is_special(n))
    }

    /// Highest numeric id used by a separator/continuation note.
    pub fn max_special_id(&self) -> i64 {
        self.special_notes()
            .filter_map(|n| self.xml.attribute(n, &W::id()))
            .filter_map(|id| id.parse::<i64>().ok())
            .max()
            .unwrap_or(-1)
    }
}

/// Parsed, immutable view of one input taken once per comparison.
#[derive(Debug)]
pub struct DocumentSnapshot<'a> {
    pub document: &'a WmlDocument,
    pub main: XmlDocument,
    pub body: NodeId,
    notes: HashMap<NoteKind, NotesPart>,
}

impl<'a> DocumentSnapshot<'a> {
    pub fn notes(&self, kind: NoteKind) -> Option<&NotesPart> {
        self.notes.get(&kind)
    }

    pub fn part(&self, part: PartKind) -> Option<&XmlDocument> {
        match part {
            PartKind::Main => Some(&self.main),
            PartKind::Footnotes => self.notes(NoteKind::Footnote).map(|n| &n.xml),
            PartKind::Endnotes => self.notes(NoteKind::Endnote).map(|n| &n.xml),
        }
    }

    pub fn part_path(&self, part: PartKind) -> &str {
        match part {
            PartKind::Main => self.document.main_part(),
            PartKind::Footnotes => self
                .notes(NoteKind::Footnote)
                .map_or("word/footnotes.xml", |n| n.path.as_str()),
            PartKind::Endnotes => self
                .notes(NoteKind::Endnote)
                .map_or("word/endnotes.xml", |n| n.path.as_str()),
        }
    }
}

pub fn find_document_body(doc: &XmlDocument) -> Option<NodeId> {
    let root = doc.root()?;
    if !doc.is_named(root, W::NS, "document") {
        return None;
    }
    doc.first_child_named(root, W::NS, "body")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(content: &str) -> String {
        format!(
            r#"<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W::NS,
            content
        )
    }

    #[test]
    fn from_main_xml_builds_a_readable_package() {
        let doc = WmlDocument::from_main_xml(&body("<w:p/>")).unwrap();
        assert_eq!(doc.main_part(), "word/document.xml");

        let reopened = WmlDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.main_xml().unwrap(), doc.main_xml().unwrap());
    }

    #[test]
    fn snapshot_requires_a_body() {
        let xml = format!(r#"<w:document xmlns:w="{}"/>"#, W::NS);
        let doc = WmlDocument::from_main_xml(&xml).unwrap();
        let err = doc.snapshot().unwrap_err();
        assert!(matches!(err, CompareError::MalformedInput { .. }));
    }

    #[test]
    fn notes_part_is_wired_and_indexed() {
        let notes = format!(
            r#"<w:footnotes xmlns:w="{ns}"><w:footnote w:type="separator" w:id="-1"/><w:footnote w:type="continuationSeparator" w:id="0"/><w:footnote w:id="1"><w:p/></w:footnote></w:footnotes>"#,
            ns = W::NS
        );
        let doc = WmlDocument::from_main_xml(&body("<w:p/>"))
            .unwrap()
            .with_notes_xml(NoteKind::Footnote, &notes)
            .unwrap();

        assert_eq!(
            doc.notes_part(NoteKind::Footnote).unwrap().as_deref(),
            Some("word/footnotes.xml")
        );
        assert_eq!(doc.notes_part(NoteKind::Endnote).unwrap(), None);

        let snap = doc.snapshot().unwrap();
        let part = snap.notes(NoteKind::Footnote).unwrap();
        assert!(part.note("1").is_some());
        assert_eq!(part.max_special_id(), 0);
        assert_eq!(part.special_notes().count(), 2);
    }

    #[test]
    fn attribution_prefers_settings() {
        let doc = WmlDocument::from_main_xml(&body("<w:p/>")).unwrap();
        let settings = WmlComparerSettings::default()
            .with_author("Alice")
            .with_date_time("2024-01-02T03:04:05Z");
        assert_eq!(doc.revision_author(&settings), "Alice");
        assert_eq!(doc.revision_date(&settings), "2024-01-02T03:04:05Z");
        assert_eq!(doc.revision_author(&WmlComparerSettings::default()), "docdelta");
    }
}
