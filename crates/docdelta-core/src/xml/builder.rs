use super::arena::XmlDocument;
use super::namespaces::{preferred_prefix, XMLNS_NS, XML_NS};
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use crate::error::{CompareError, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

/// namespace uri -> prefix ("" for the default namespace)
type NamespaceMap = HashMap<String, String>;

fn write_err(e: impl std::fmt::Display) -> CompareError {
    CompareError::XmlWrite(e.to_string())
}

pub fn serialize(doc: &XmlDocument) -> Result<String> {
    String::from_utf8(serialize_bytes(doc)?).map_err(write_err)
}

pub fn serialize_bytes(doc: &XmlDocument) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(write_err)?;

    if let Some(root_id) = doc.root() {
        let mut root_attrs = doc
            .get(root_id)
            .and_then(|d| d.attributes())
            .map(|a| a.to_vec())
            .unwrap_or_default();
        let mut namespace_map = NamespaceMap::new();
        extend_namespace_map(&mut namespace_map, &root_attrs);

        // Content grafted from another part may use namespaces the root of
        // this part never declared; declare them up front.
        for ns in undeclared_namespaces(doc, root_id, &namespace_map) {
            let prefix = unique_prefix(preferred_prefix(&ns), &namespace_map);
            root_attrs.push(XAttribute::new(XName::new(XMLNS_NS, &prefix), &ns));
            namespace_map.insert(ns, prefix);
        }

        match doc.get(root_id) {
            Some(XmlNodeData::Element { name, .. }) => {
                write_element(doc, root_id, name, &root_attrs, &mut writer, &namespace_map)?;
            }
            Some(_) => write_node(doc, root_id, &mut writer, &namespace_map)?,
            None => {}
        }
    }

    Ok(writer.into_inner().into_inner())
}

/// Serializes one subtree without an XML declaration, re-declaring the
/// namespaces its ancestors provided.
pub fn serialize_subtree(doc: &XmlDocument, node_id: indextree::NodeId) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    match doc.get(node_id) {
        Some(XmlNodeData::Element { name, attributes }) => {
            let mut attrs = attributes.clone();
            let mut namespace_map = NamespaceMap::new();
            for ancestor in doc.ancestors(node_id) {
                if let Some(ancestor_attrs) = doc.get(ancestor).and_then(|d| d.attributes()) {
                    extend_namespace_map(&mut namespace_map, ancestor_attrs);
                }
            }
            for ns in undeclared_namespaces(doc, node_id, &NamespaceMap::new()) {
                let prefix = namespace_map
                    .get(&ns)
                    .cloned()
                    .unwrap_or_else(|| preferred_prefix(&ns).to_string());
                let decl = if prefix.is_empty() {
                    XName::local("xmlns")
                } else {
                    XName::new(XMLNS_NS, &prefix)
                };
                if !attrs.iter().any(|a| a.name == decl) {
                    attrs.push(XAttribute::new(decl, &ns));
                }
            }
            let mut scoped = NamespaceMap::new();
            extend_namespace_map(&mut scoped, &attrs);
            write_element(doc, node_id, name, &attrs, &mut writer, &scoped)?;
        }
        Some(_) => write_node(doc, node_id, &mut writer, &NamespaceMap::new())?,
        None => return Ok(String::new()),
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(write_err)
}

fn undeclared_namespaces(
    doc: &XmlDocument,
    root: indextree::NodeId,
    declared: &NamespaceMap,
) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for id in doc.descendants(root) {
        let Some(XmlNodeData::Element { name, attributes }) = doc.get(id) else {
            continue;
        };
        let mut local_decls = NamespaceMap::new();
        extend_namespace_map(&mut local_decls, attributes);
        let names = std::iter::once(name).chain(
            attributes
                .iter()
                .filter(|a| !a.is_namespace_declaration())
                .map(|a| &a.name),
        );
        for n in names {
            if let Some(ns) = &n.namespace {
                if ns != XML_NS && !declared.contains_key(ns) && !local_decls.contains_key(ns) {
                    found.insert(ns.clone());
                }
            }
        }
    }
    // Anything declared further down the tree is still handled locally; a
    // duplicate declaration on the root is harmless.
    found
}

fn unique_prefix(preferred: &str, namespace_map: &NamespaceMap) -> String {
    let taken = |p: &str| namespace_map.values().any(|v| v == p);
    if preferred != "ns" && !taken(preferred) {
        return preferred.to_string();
    }
    let mut n = 0;
    loop {
        let candidate = format!("ns{}", n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn extend_namespace_map(namespace_map: &mut NamespaceMap, attributes: &[XAttribute]) {
    for attr in attributes {
        match &attr.name.namespace {
            None if attr.name.local_name == "xmlns" => {
                namespace_map.insert(attr.value.clone(), String::new());
            }
            Some(ns) if ns == XMLNS_NS => {
                namespace_map.insert(attr.value.clone(), attr.name.local_name.clone());
            }
            _ => {}
        }
    }
}

fn qualified_element_name(name: &XName, namespace_map: &NamespaceMap) -> String {
    let Some(ns) = &name.namespace else {
        return name.local_name.clone();
    };
    let prefix = namespace_map
        .get(ns)
        .map(String::as_str)
        .unwrap_or_else(|| preferred_prefix(ns));
    if prefix.is_empty() {
        name.local_name.clone()
    } else {
        format!("{}:{}", prefix, name.local_name)
    }
}

fn qualified_attribute_name(name: &XName, namespace_map: &NamespaceMap) -> String {
    let Some(ns) = &name.namespace else {
        return name.local_name.clone();
    };
    let prefix = match ns.as_str() {
        XMLNS_NS => "xmlns",
        XML_NS => "xml",
        // Unprefixed attributes are never in the default namespace.
        _ => namespace_map
            .get(ns)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| preferred_prefix(ns)),
    };
    format!("{}:{}", prefix, name.local_name)
}

fn write_node<W: std::io::Write>(
    doc: &XmlDocument,
    node_id: indextree::NodeId,
    writer: &mut Writer<W>,
    namespace_map: &NamespaceMap,
) -> Result<()> {
    let Some(node_data) = doc.get(node_id) else {
        return Ok(());
    };

    match node_data {
        XmlNodeData::Element { name, attributes } => {
            write_element(doc, node_id, name, attributes, writer, namespace_map)?;
        }
        XmlNodeData::Text(text) => {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_err)?;
        }
        XmlNodeData::CData(text) => {
            writer
                .write_event(Event::CData(BytesCData::new(text)))
                .map_err(write_err)?;
        }
        XmlNodeData::Comment(text) => {
            writer
                .write_event(Event::Comment(BytesText::new(text)))
                .map_err(write_err)?;
        }
        XmlNodeData::ProcessingInstruction { target, data } => {
            let content = if data.is_empty() {
                target.clone()
            } else {
                format!("{} {}", target, data)
            };
            writer
                .write_event(Event::PI(BytesPI::new(&content)))
                .map_err(write_err)?;
        }
    }

    Ok(())
}

fn write_element<W: std::io::Write>(
    doc: &XmlDocument,
    node_id: indextree::NodeId,
    name: &XName,
    attributes: &[XAttribute],
    writer: &mut Writer<W>,
    namespace_map: &NamespaceMap,
) -> Result<()> {
    let mut scoped_map = namespace_map.clone();
    extend_namespace_map(&mut scoped_map, attributes);

    let tag_name = qualified_element_name(name, &scoped_map);
    let mut elem = BytesStart::new(tag_name.as_str());
    for attr in attributes {
        let attr_name = qualified_attribute_name(&attr.name, &scoped_map);
        elem.push_attribute((attr_name.as_str(), attr.value.as_str()));
    }

    let mut children = doc.children(node_id).peekable();
    if children.peek().is_none() {
        writer.write_event(Event::Empty(elem)).map_err(write_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem)).map_err(write_err)?;
    for child_id in children {
        write_node(doc, child_id, writer, &scoped_map)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag_name.as_str())))
        .map_err(write_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespaces::W;
    use crate::xml::parser::parse;

    #[test]
    fn serialize_simple_document() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(XName::local("root")));
        doc.add_child(root, XmlNodeData::text("content"));

        let xml = serialize(&doc).unwrap();
        assert!(xml.contains("<root>content</root>"));
    }

    #[test]
    fn serialize_empty_element() {
        let mut doc = XmlDocument::new();
        doc.add_root(XmlNodeData::element(XName::local("empty")));

        let xml = serialize(&doc).unwrap();
        assert!(xml.contains("<empty/>"));
    }

    #[test]
    fn undeclared_namespace_is_declared_on_root() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(W::document()));
        doc.add_child(root, XmlNodeData::element(W::body()));

        let xml = serialize(&doc).unwrap();
        assert!(xml.contains(&format!("xmlns:w=\"{}\"", W::NS)));
        assert!(xml.contains("<w:body/>"));
    }

    #[test]
    fn roundtrip_keeps_prefixes_and_escapes_text() {
        let input = format!(
            r#"<w:document xmlns:w="{}"><w:body><w:p><w:r><w:t xml:space="preserve">a &amp; b</w:t></w:r></w:p></w:body></w:document>"#,
            W::NS
        );
        let doc = parse(&input).unwrap();
        let xml = serialize(&doc).unwrap();
        assert!(xml.contains(r#"<w:t xml:space="preserve">a &amp; b</w:t>"#));
    }

    #[test]
    fn subtree_redeclares_namespaces() {
        let input = format!(r#"<w:document xmlns:w="{}"><w:body><w:p/></w:body></w:document>"#, W::NS);
        let doc = parse(&input).unwrap();
        let body = doc.element_children(doc.root().unwrap()).next().unwrap();
        let xml = serialize_subtree(&doc, body).unwrap();
        assert_eq!(xml, format!(r#"<w:body xmlns:w="{}"><w:p/></w:body>"#, W::NS));
    }
}
