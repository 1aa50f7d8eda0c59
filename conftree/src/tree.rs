use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// A generic XML tree node.
///
/// Appliance configuration documents are large, mostly-opaque trees; the
/// model keeps every element verbatim (tags, attributes, text, ordering) so
/// a patched document can be written back without disturbing sections the
/// caller never looked at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements, in document order.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Create a leaf node holding only text content.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(tag);
        node.text = Some(text.into());
        node
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return the first child with the provided tag, mutably.
    pub fn get_child_mut(&mut self, tag: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        if path.is_empty() {
            return self.text.as_deref();
        }

        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        current.text.as_deref()
    }

    /// Get or create the first child with the provided tag.
    pub fn ensure_child(&mut self, tag: &str) -> &mut XmlNode {
        if let Some(idx) = self.children.iter().position(|c| c.tag == tag) {
            return &mut self.children[idx];
        }
        self.children.push(XmlNode::new(tag));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Walk a nested child path, creating missing intermediate elements.
    pub fn ensure_path(&mut self, path: &[&str]) -> &mut XmlNode {
        let mut current = self;
        for segment in path {
            current = current.ensure_child(segment);
        }
        current
    }

    /// Set the text of the first child with the provided tag, creating the
    /// child if absent. Existing children/attributes of the child are kept.
    pub fn set_child_text(&mut self, tag: &str, text: impl Into<String>) {
        self.ensure_child(tag).text = Some(text.into());
    }

    /// Replace all children of this node, keeping tag and attributes.
    pub fn replace_children(&mut self, children: Vec<XmlNode>) {
        self.children = children;
        self.text = None;
    }

    /// Append a child element and return a mutable reference to it.
    pub fn push_child(&mut self, child: XmlNode) -> &mut XmlNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Remove every child with the provided tag.
    pub fn remove_children(&mut self, tag: &str) {
        self.children.retain(|c| c.tag != tag);
    }
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", text)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}
