use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl XName {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self {
            namespace: if namespace.is_empty() {
                None
            } else {
                Some(namespace.to_string())
            },
            local_name: local_name.to_string(),
        }
    }

    pub fn local(local_name: &str) -> Self {
        Self {
            namespace: None,
            local_name: local_name.to_string(),
        }
    }

    /// Namespace-qualified comparison without allocating an `XName`.
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }
}

impl fmt::Display for XName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct XAttribute {
    pub name: XName,
    pub value: String,
}

impl XAttribute {
    pub fn new(name: XName, value: &str) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }

    pub fn is_namespace_declaration(&self) -> bool {
        (self.name.namespace.is_none() && self.name.local_name == "xmlns")
            || self.name.namespace.as_deref() == Some(super::namespaces::XMLNS_NS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xname_with_namespace_displays_correctly() {
        let name = XName::new("http://example.com", "element");
        assert_eq!(name.to_string(), "{http://example.com}element");
    }

    #[test]
    fn empty_namespace_is_none() {
        let name = XName::new("", "element");
        assert!(name.namespace.is_none());
        assert_eq!(name, XName::local("element"));
    }

    #[test]
    fn is_matches_namespace_and_local_name() {
        let name = XName::new("urn:a", "p");
        assert!(name.is("urn:a", "p"));
        assert!(!name.is("urn:b", "p"));
        assert!(!name.is("urn:a", "r"));
    }
}
