use super::arena::XmlDocument;
use super::namespaces::XMLNS_NS;
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use crate::error::{CompareError, Result};

pub fn parse(xml: &str) -> Result<XmlDocument> {
    let doc = roxmltree::Document::parse_with_options(
        xml,
        roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        },
    )
    .map_err(|e| CompareError::XmlParse {
        message: e.to_string(),
        location: format!("line {}", e.pos().row),
    })?;

    let mut xml_doc = XmlDocument::new();
    build_tree(doc.root_element(), &mut xml_doc, None);
    Ok(xml_doc)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<XmlDocument> {
    // Parts written by Word usually start with a UTF-8 BOM.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| CompareError::XmlParse {
        message: e.to_string(),
        location: "input".to_string(),
    })?;
    parse(text)
}

fn build_tree(node: roxmltree::Node, doc: &mut XmlDocument, parent: Option<indextree::NodeId>) {
    let node_data = match node.node_type() {
        roxmltree::NodeType::Element => {
            let name = XName::new(
                node.tag_name().namespace().unwrap_or(""),
                node.tag_name().name(),
            );

            let mut attributes: Vec<XAttribute> = node
                .attributes()
                .map(|attr| {
                    XAttribute::new(
                        XName::new(attr.namespace().unwrap_or(""), attr.name()),
                        attr.value(),
                    )
                })
                .collect();

            // roxmltree reports every namespace in scope; keep only those
            // this element declares so the writer reproduces the original scoping.
            let inherited: Vec<(Option<&str>, &str)> = node
                .parent_element()
                .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
                .unwrap_or_default();
            for ns in node.namespaces() {
                if inherited.contains(&(ns.name(), ns.uri())) {
                    continue;
                }
                let decl = match ns.name() {
                    Some(prefix) => XName::new(XMLNS_NS, prefix),
                    None => XName::local("xmlns"),
                };
                attributes.push(XAttribute::new(decl, ns.uri()));
            }

            XmlNodeData::Element { name, attributes }
        }
        roxmltree::NodeType::Text => {
            let Some(text) = node.text() else {
                return;
            };
            if text.trim().is_empty() && has_element_siblings(node) {
                return;
            }
            XmlNodeData::Text(text.to_string())
        }
        roxmltree::NodeType::Comment => match node.text() {
            Some(text) => XmlNodeData::Comment(text.to_string()),
            None => return,
        },
        roxmltree::NodeType::PI => match node.pi() {
            Some(pi) => XmlNodeData::ProcessingInstruction {
                target: pi.target.to_string(),
                data: pi.value.unwrap_or_default().to_string(),
            },
            None => return,
        },
        roxmltree::NodeType::Root => return,
    };

    let new_id = match parent {
        Some(parent_id) => doc.add_child(parent_id, node_data),
        None => doc.add_root(node_data),
    };

    for child in node.children() {
        build_tree(child, doc, Some(new_id));
    }
}

/// Whitespace between elements is formatting; whitespace that is the only
/// content of an element (e.g. `<w:t xml:space="preserve"> </w:t>`) is data.
fn has_element_siblings(node: roxmltree::Node) -> bool {
    node.parent()
        .is_some_and(|p| p.children().any(|c| c.is_element()))
}
