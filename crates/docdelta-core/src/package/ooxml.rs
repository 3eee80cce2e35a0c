use crate::error::{CompareError, Result};
use crate::xml::namespaces::{CP, DC, DCTERMS};
use crate::xml::XmlDocument;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::read::ZipArchive;
use zip::write::ZipWriter;
use zip::CompressionMethod;

use super::content_types::ContentTypes;
use super::relationships::{rels_path_for, relationship_types, resolve_target, Relationships};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// The `docProps/core.xml` fields that feed revision attribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreProperties {
    /// `cp:lastModifiedBy`
    pub last_modified_by: Option<String>,
    /// `dc:creator`
    pub creator: Option<String>,
    /// `dcterms:modified`, verbatim
    pub modified: Option<String>,
}

/// A zip container of named parts. Parts are kept as raw bytes and parsed on
/// demand; the sorted map keeps saved archives byte-for-byte reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OoxmlPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl OoxmlPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            parts.insert(name, content);
        }

        if !parts.contains_key(CONTENT_TYPES_PART) {
            return Err(CompareError::InvalidPackage {
                message: format!("missing {}", CONTENT_TYPES_PART),
            });
        }
        Ok(Self { parts })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut buffer);
        let options: zip::write::FileOptions<'_, ()> =
            zip::write::FileOptions::default().compression_method(CompressionMethod::Deflated);

        // Content types first, as Office writes it.
        let ordered = self
            .parts
            .iter()
            .filter(|(path, _)| path.as_str() == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|(path, _)| path.as_str() != CONTENT_TYPES_PART));
        for (path, content) in ordered {
            writer.start_file(path.as_str(), options)?;
            writer.write_all(content)?;
        }

        writer.finish()?;
        Ok(buffer.into_inner())
    }

    pub fn get_part(&self, path: &str) -> Option<&[u8]> {
        self.parts.get(path).map(|v| v.as_slice())
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    pub fn get_xml_part(&self, path: &str) -> Result<XmlDocument> {
        let bytes = self.get_part(path).ok_or_else(|| CompareError::MissingPart {
            part_path: path.to_string(),
            document_type: "docx".to_string(),
        })?;
        crate::xml::parser::parse_bytes(bytes)
    }

    pub fn set_part(&mut self, path: &str, content: Vec<u8>) {
        self.parts.insert(path.to_string(), content);
    }

    pub fn put_xml_part(&mut self, path: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = crate::xml::builder::serialize_bytes(doc)?;
        self.set_part(path, bytes);
        Ok(())
    }

    /// Relationships whose source is `part` ("" for the package itself).
    pub fn relationships(&self, part: &str) -> Result<Relationships> {
        let path = if part.is_empty() {
            "_rels/.rels".to_string()
        } else {
            rels_path_for(part)
        };
        match self.get_part(&path) {
            Some(bytes) => Relationships::parse(bytes),
            None => Ok(Relationships::default()),
        }
    }

    pub fn put_relationships(&mut self, part: &str, rels: &Relationships) -> Result<()> {
        let path = if part.is_empty() {
            "_rels/.rels".to_string()
        } else {
            rels_path_for(part)
        };
        self.set_part(&path, rels.to_xml_bytes()?);
        Ok(())
    }

    pub fn content_types(&self) -> Result<ContentTypes> {
        match self.get_part(CONTENT_TYPES_PART) {
            Some(bytes) => ContentTypes::parse(bytes),
            None => Ok(ContentTypes::new()),
        }
    }

    pub fn put_content_types(&mut self, content_types: &ContentTypes) -> Result<()> {
        self.set_part(CONTENT_TYPES_PART, content_types.to_xml_bytes()?);
        Ok(())
    }

    /// Path of the part the package-level officeDocument relationship points at.
    pub fn main_document_part(&self) -> Result<String> {
        let rels = self.relationships("")?;
        let target = rels
            .first_of_type(relationship_types::OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| "word/document.xml".to_string());
        if !self.has_part(&target) {
            return Err(CompareError::MissingPart {
                part_path: target,
                document_type: "Word".to_string(),
            });
        }
        Ok(target)
    }

    /// Target part of the first relationship of `rel_type` from `source`.
    pub fn related_part(&self, source: &str, rel_type: &str) -> Result<Option<String>> {
        let rels = self.relationships(source)?;
        let part = rels
            .iter()
            .find(|r| r.rel_type == rel_type && !r.is_external())
            .map(|r| resolve_target(source, &r.target))
            .filter(|p| self.has_part(p));
        Ok(part)
    }

    /// Reads `docProps/core.xml`.
    ///
    /// These are used to determine the default author and date for revisions;
    /// a missing or unreadable part yields empty properties.
    pub fn get_core_properties(&self) -> CoreProperties {
        let Ok(core_xml) = self.get_xml_part(CORE_PROPERTIES_PART) else {
            return CoreProperties::default();
        };
        let Some(root) = core_xml.root() else {
            return CoreProperties::default();
        };

        let element_text = |ns: &str, local: &str| {
            core_xml
                .descendants(root)
                .find(|&n| core_xml.is_named(n, ns, local))
                .map(|n| core_xml.text_content(n).trim().to_string())
                .filter(|t| !t.is_empty())
        };

        CoreProperties {
            last_modified_by: element_text(CP::NS, "lastModifiedBy"),
            creator: element_text(DC::NS, "creator"),
            modified: element_text(DCTERMS::NS, "modified"),
        }
    }
}
