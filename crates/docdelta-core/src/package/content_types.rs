use crate::error::Result;
use crate::xml::namespaces::CT;
use crate::xml::{builder, parser, XAttribute, XName, XmlDocument, XmlNodeData};
use std::collections::BTreeMap;

/// `[Content_Types].xml`: extension defaults plus per-part overrides.
/// Part names are kept without the leading slash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    pub fn new() -> Self {
        let mut ct = Self::default();
        ct.add_default("rels", content_type_values::RELATIONSHIPS);
        ct.add_default("xml", "application/xml");
        ct
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = parser::parse_bytes(bytes)?;
        let mut ct = Self::default();
        let Some(root) = doc.root() else {
            return Ok(ct);
        };
        for node in doc.element_children(root) {
            let attr = |name: &str| doc.attribute(node, &XName::local(name)).unwrap_or_default();
            if doc.is_named(node, CT::NS, "Default") {
                ct.add_default(attr("Extension"), attr("ContentType"));
            } else if doc.is_named(node, CT::NS, "Override") {
                ct.set_content_type(attr("PartName"), attr("ContentType"));
            }
        }
        Ok(ct)
    }

    pub fn to_xml_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element_with_attrs(
            XName::new(CT::NS, "Types"),
            vec![XAttribute::new(XName::local("xmlns"), CT::NS)],
        ));
        for (ext, ct) in &self.defaults {
            doc.add_child(
                root,
                XmlNodeData::element_with_attrs(
                    XName::new(CT::NS, "Default"),
                    vec![
                        XAttribute::new(XName::local("Extension"), ext),
                        XAttribute::new(XName::local("ContentType"), ct),
                    ],
                ),
            );
        }
        for (part, ct) in &self.overrides {
            doc.add_child(
                root,
                XmlNodeData::element_with_attrs(
                    XName::new(CT::NS, "Override"),
                    vec![
                        XAttribute::new(XName::local("PartName"), &format!("/{}", part)),
                        XAttribute::new(XName::local("ContentType"), ct),
                    ],
                ),
            );
        }
        builder::serialize_bytes(&doc)
    }

    pub fn get_content_type(&self, path: &str) -> Option<&str> {
        let path = path.trim_start_matches('/');
        if let Some(ct) = self.overrides.get(path) {
            return Some(ct);
        }
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }

    pub fn set_content_type(&mut self, path: &str, content_type: &str) {
        self.overrides
            .insert(path.trim_start_matches('/').to_string(), content_type.to_string());
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_ascii_lowercase(), content_type.to_string());
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.defaults.contains_key(&extension.to_ascii_lowercase())
    }
}

pub mod content_type_values {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const WORD_DOCUMENT: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
    pub const WORD_FOOTNOTES: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml";
    pub const WORD_ENDNOTES: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_default() {
        let mut ct = ContentTypes::new();
        ct.set_content_type("/word/document.xml", content_type_values::WORD_DOCUMENT);
        assert_eq!(ct.get_content_type("word/document.xml"), Some(content_type_values::WORD_DOCUMENT));
        assert_eq!(ct.get_content_type("word/other.xml"), Some("application/xml"));
        assert_eq!(ct.get_content_type("word/media/a.png"), None);
    }

    #[test]
    fn parse_and_write_roundtrip() {
        let mut ct = ContentTypes::new();
        ct.add_default("PNG", "image/png");
        ct.set_content_type("word/document.xml", content_type_values::WORD_DOCUMENT);

        let parsed = ContentTypes::parse(&ct.to_xml_bytes().unwrap()).unwrap();
        assert_eq!(parsed, ct);
        assert!(parsed.has_default("png"));
    }
}
