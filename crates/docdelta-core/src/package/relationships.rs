use crate::error::Result;
use crate::xml::namespaces::PR;
use crate::xml::{builder, parser, XAttribute, XName, XmlDocument, XmlNodeData};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    #[serde(default)]
    pub target_mode: TargetMode,
}

impl Relationship {
    pub fn new(id: &str, rel_type: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: TargetMode::Internal,
        }
    }

    pub fn external(id: &str, rel_type: &str, target: &str) -> Self {
        Self {
            target_mode: TargetMode::External,
            ..Self::new(id, rel_type, target)
        }
    }

    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }
}

/// The relationships of one source part, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = parser::parse_bytes(bytes)?;
        let mut items = Vec::new();
        let Some(root) = doc.root() else {
            return Ok(Self { items });
        };
        let attr = |node, name: &str| {
            doc.attribute(node, &XName::local(name))
                .unwrap_or_default()
                .to_string()
        };
        for node in doc.element_children(root) {
            if !doc.is_named(node, PR::NS, "Relationship") {
                continue;
            }
            let mode = if attr(node, "TargetMode") == "External" {
                TargetMode::External
            } else {
                TargetMode::Internal
            };
            items.push(Relationship {
                id: attr(node, "Id"),
                rel_type: attr(node, "Type"),
                target: attr(node, "Target"),
                target_mode: mode,
            });
        }
        Ok(Self { items })
    }

    pub fn to_xml_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element_with_attrs(
            XName::new(PR::NS, "Relationships"),
            vec![XAttribute::new(XName::local("xmlns"), PR::NS)],
        ));
        for rel in &self.items {
            let mut attrs = vec![
                XAttribute::new(XName::local("Id"), &rel.id),
                XAttribute::new(XName::local("Type"), &rel.rel_type),
                XAttribute::new(XName::local("Target"), &rel.target),
            ];
            if rel.is_external() {
                attrs.push(XAttribute::new(XName::local("TargetMode"), "External"));
            }
            doc.add_child(
                root,
                XmlNodeData::element_with_attrs(XName::new(PR::NS, "Relationship"), attrs),
            );
        }
        builder::serialize_bytes(&doc)
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a relationship under a fresh `rIdN` id and returns the id.
    pub fn add(&mut self, rel_type: &str, target: &str, mode: TargetMode) -> String {
        let mut n = self.items.len() + 1;
        let id = loop {
            let candidate = format!("rId{}", n);
            if self.get(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: mode,
        });
        id
    }

    pub fn push(&mut self, rel: Relationship) {
        self.items.push(rel);
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against its source part into a package path
/// without a leading slash.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Inverse of [`resolve_target`] for parts that live under the source part's folder.
pub fn relative_target(source_part: &str, part: &str) -> String {
    let dir = source_part.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    match part.strip_prefix(dir).and_then(|p| p.strip_prefix('/')) {
        Some(rel) if !dir.is_empty() => rel.to_string(),
        _ => format!("/{}", part),
    }
}

pub mod relationship_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const FOOTNOTES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footnotes";
    pub const ENDNOTES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/endnotes";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}
