use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use indextree::{Arena, NodeId};

/// Arena-backed XML tree. Node ids stay valid for the lifetime of the
/// document, which lets atoms point back at the node they came from.
#[derive(Clone)]
pub struct XmlDocument {
    arena: Arena<XmlNodeData>,
    root: Option<NodeId>,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn get(&self, id: NodeId) -> Option<&XmlNodeData> {
        self.arena.get(id).map(|node| node.get())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut XmlNodeData> {
        self.arena.get_mut(id).map(|node| node.get_mut())
    }

    pub fn add_root(&mut self, data: XmlNodeData) -> NodeId {
        let id = self.arena.new_node(data);
        self.root = Some(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, data: XmlNodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        child
    }

    pub fn add_before(&mut self, sibling: NodeId, data: XmlNodeData) -> NodeId {
        let new_node = self.arena.new_node(data);
        sibling.insert_before(new_node, &mut self.arena);
        new_node
    }

    pub fn add_after(&mut self, sibling: NodeId, data: XmlNodeData) -> NodeId {
        let new_node = self.arena.new_node(data);
        sibling.insert_after(new_node, &mut self.arena);
        new_node
    }

    /// Removes the node and its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        node.remove_subtree(&mut self.arena);
    }

    /// Removes every child of `parent`, keeping `parent` itself.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children: Vec<NodeId> = self.children(parent).collect();
        for child in children {
            self.remove(child);
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &XName, value: &str) {
        if let Some(attrs) = self.get_mut(node).and_then(|d| d.attributes_mut()) {
            if let Some(attr) = attrs.iter_mut().find(|a| &a.name == name) {
                attr.value = value.to_string();
            } else {
                attrs.push(XAttribute::new(name.clone(), value));
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &XName) {
        if let Some(attrs) = self.get_mut(node).and_then(|d| d.attributes_mut()) {
            attrs.retain(|a| &a.name != name);
        }
    }

    pub fn attribute(&self, node: NodeId, name: &XName) -> Option<&str> {
        self.get(node)?.attribute(name)
    }

    pub fn name(&self, node: NodeId) -> Option<&XName> {
        self.get(node)?.name()
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.text_content()
    }

    pub fn is_named(&self, node: NodeId, namespace: &str, local_name: &str) -> bool {
        self.get(node)
            .is_some_and(|d| d.is_named(namespace, local_name))
    }

    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        parent.children(&self.arena)
    }

    /// Element children only; text, comments and PIs are skipped.
    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent)
            .filter(move |&c| self.get(c).is_some_and(|d| d.is_element()))
    }

    pub fn first_child_named(&self, parent: NodeId, namespace: &str, local_name: &str) -> Option<NodeId> {
        self.children(parent)
            .find(|&c| self.is_named(c, namespace, local_name))
    }

    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.descendants(&self.arena)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.parent()
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.ancestors(&self.arena)
    }

    /// Concatenated text of every text node below `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .filter_map(|d| self.text(d))
            .collect()
    }
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument")
            .field("nodes", &self.arena.count())
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_document_with_root() {
        let mut doc = XmlDocument::new();
        let root_name = XName::new("http://example.com", "root");
        let root_id = doc.add_root(XmlNodeData::element(root_name.clone()));

        assert_eq!(doc.root(), Some(root_id));
        assert_eq!(doc.name(root_id), Some(&root_name));
    }

    #[test]
    fn element_children_skip_text() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(XName::local("root")));
        doc.add_child(root, XmlNodeData::text("  "));
        let child = doc.add_child(root, XmlNodeData::element(XName::local("a")));

        let children: Vec<_> = doc.element_children(root).collect();
        assert_eq!(children, vec![child]);
    }

    #[test]
    fn remove_drops_subtree() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(XName::local("root")));
        let a = doc.add_child(root, XmlNodeData::element(XName::local("a")));
        doc.add_child(a, XmlNodeData::text("x"));

        doc.remove(a);
        assert_eq!(doc.children(root).count(), 0);
        assert_eq!(doc.text_content(root), "");
    }

    #[test]
    fn set_attribute_replaces_existing_value() {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element(XName::local("root")));
        let id = XName::local("id");

        doc.set_attribute(root, &id, "1");
        doc.set_attribute(root, &id, "2");

        assert_eq!(doc.attribute(root, &id), Some("2"));
        assert_eq!(doc.get(root).and_then(|d| d.attributes()).map(|a| a.len()), Some(1));
    }
}
