//! Owned XML subtrees.
//!
//! Atoms and container shells outlive the arena they were read from and are
//! re-assembled into a different tree, so they carry their markup as an
//! `XmlFragment` rather than a `NodeId`.

use super::arena::XmlDocument;
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use indextree::NodeId;
use std::fmt::Write as _;

#[derive(Clone, Debug, PartialEq)]
pub struct XmlFragment {
    pub node: XmlNodeData,
    pub children: Vec<XmlFragment>,
}

impl XmlFragment {
    pub fn element(name: XName) -> Self {
        Self {
            node: XmlNodeData::element(name),
            children: Vec::new(),
        }
    }

    pub fn element_with_attrs(name: XName, attributes: Vec<XAttribute>) -> Self {
        Self {
            node: XmlNodeData::element_with_attrs(name, attributes),
            children: Vec::new(),
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            node: XmlNodeData::text(content),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: XmlFragment) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_attr(mut self, name: XName, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Copies the subtree rooted at `id` out of the arena.
    pub fn extract(doc: &XmlDocument, id: NodeId) -> Self {
        let node = doc
            .get(id)
            .cloned()
            .unwrap_or_else(|| XmlNodeData::Text(String::new()));
        let children = doc.children(id).map(|c| Self::extract(doc, c)).collect();
        Self { node, children }
    }

    /// Copies the subtree into `doc` as the last child of `parent`.
    pub fn graft(&self, doc: &mut XmlDocument, parent: NodeId) -> NodeId {
        let id = doc.add_child(parent, self.node.clone());
        for child in &self.children {
            child.graft(doc, id);
        }
        id
    }

    /// Builds a standalone document whose root is this fragment.
    pub fn into_document(self) -> XmlDocument {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(self.node);
        for child in &self.children {
            child.graft(&mut doc, root);
        }
        doc
    }

    pub fn name(&self) -> Option<&XName> {
        self.node.name()
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.node.is_named(namespace, local_name)
    }

    pub fn attribute(&self, name: &XName) -> Option<&str> {
        self.node.attribute(name)
    }

    pub fn set_attribute(&mut self, name: XName, value: &str) {
        if let Some(attrs) = self.node.attributes_mut() {
            match attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value.to_string(),
                None => attrs.push(XAttribute::new(name, value)),
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &XName) {
        if let Some(attrs) = self.node.attributes_mut() {
            attrs.retain(|a| &a.name != name);
        }
    }

    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&XmlFragment> {
        self.children.iter().find(|c| c.is(namespace, local_name))
    }

    pub fn child_mut(&mut self, namespace: &str, local_name: &str) -> Option<&mut XmlFragment> {
        self.children.iter_mut().find(|c| c.is(namespace, local_name))
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlFragment> {
        self.children.iter().filter(|c| c.node.is_element())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(t) = self.node.text_content() {
            out.push_str(t);
        }
        for c in &self.children {
            c.collect_text(out);
        }
    }

    /// Depth-first walk over every element, outermost first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut XmlFragment)) {
        f(self);
        for c in &mut self.children {
            c.walk_mut(f);
        }
    }

    pub fn walk(&self, f: &mut impl FnMut(&XmlFragment)) {
        f(self);
        for c in &self.children {
            c.walk(f);
        }
    }

    /// Order-sensitive textual signature. Attributes are sorted and namespace
    /// declarations skipped, so prefix choice and attribute order don't matter.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match &self.node {
            XmlNodeData::Element { name, attributes } => {
                let _ = write!(out, "<{}", name);
                let mut attrs: Vec<&XAttribute> = attributes
                    .iter()
                    .filter(|a| !a.is_namespace_declaration())
                    .collect();
                attrs.sort_by(|a, b| a.name.cmp(&b.name));
                for a in attrs {
                    let _ = write!(out, " {}=\"{}\"", a.name, a.value);
                }
                out.push('>');
                for c in &self.children {
                    c.write_canonical(out);
                }
                out.push_str("</>");
            }
            XmlNodeData::Text(t) | XmlNodeData::CData(t) => out.push_str(t),
            XmlNodeData::Comment(_) | XmlNodeData::ProcessingInstruction { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::parse;

    #[test]
    fn extract_and_graft_copy_the_subtree() {
        let src = parse("<a><b x=\"1\"><c>t</c></b></a>").unwrap();
        let b = src.element_children(src.root().unwrap()).next().unwrap();
        let frag = XmlFragment::extract(&src, b);

        let mut dst = XmlDocument::new();
        let root = dst.add_root(XmlNodeData::element(XName::local("root")));
        let grafted = frag.graft(&mut dst, root);

        assert_eq!(dst.attribute(grafted, &XName::local("x")), Some("1"));
        assert_eq!(dst.text_content(root), "t");
    }

    #[test]
    fn canonical_ignores_attribute_order() {
        let a = parse("<e b=\"2\" a=\"1\"/>").unwrap();
        let b = parse("<e a=\"1\" b=\"2\"/>").unwrap();
        let fa = XmlFragment::extract(&a, a.root().unwrap());
        let fb = XmlFragment::extract(&b, b.root().unwrap());
        assert_eq!(fa.canonical(), fb.canonical());
    }

    #[test]
    fn set_attribute_adds_then_replaces() {
        let mut f = XmlFragment::element(XName::local("e"));
        f.set_attribute(XName::local("k"), "1");
        f.set_attribute(XName::local("k"), "2");
        assert_eq!(f.attribute(&XName::local("k")), Some("2"));
    }
}
