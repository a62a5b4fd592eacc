//! A small ordered XML tree.
//!
//! Nodes live in an arena owned by the tree and are addressed by copyable
//! [`NodeId`] handles, so builders can hold on to a parent handle while the
//! tree keeps growing. Attribute order is insertion order; serialization goes
//! through quick-xml with two space indentation.
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::error::IdfWriterError;

const XML_DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8'?>\n";
const INDENT_SIZE: usize = 2;

/// Handle to a node of an [`XmlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

/// Returned by [`XmlTree::append`]; chains attribute insertion on the new element
pub struct ElementBuilder<'t> {
    tree: &'t mut XmlTree,
    id: NodeId,
}

impl ElementBuilder<'_> {
    pub fn attr(self, key: &str, value: impl Into<String>) -> Self {
        self.tree.set_attribute(self.id, key, value);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl XmlTree {
    /// Create a tree holding a single root element
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    name: root_name.to_string(),
                    attributes: Vec::new(),
                },
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a new element as the last child of parent
    pub fn append(&mut self, parent: NodeId, name: &str) -> ElementBuilder<'_> {
        let id = self.push_node(
            parent,
            NodeKind::Element {
                name: name.to_string(),
                attributes: Vec::new(),
            },
        );
        ElementBuilder { tree: self, id }
    }

    /// Append a comment as the last child of parent.
    ///
    /// XML comments may not contain `--` or end in `-`; such text is spaced out.
    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mut text = text.to_string();
        while text.contains("--") {
            text = text.replace("--", "- -");
        }
        if text.ends_with('-') {
            text.push(' ');
        }
        self.push_node(parent, NodeKind::Comment(text))
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        debug_assert!(self.name(parent).is_some(), "comments cannot hold children");
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Set an attribute, replacing the value if the key is already present
    pub fn set_attribute(&mut self, node: NodeId, key: &str, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            let value = value.into();
            match attributes.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value,
                None => attributes.push((key.to_string(), value)),
            }
        }
    }

    pub fn attribute(&self, node: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            NodeKind::Comment(_) => None,
        }
    }

    /// Element name, None for comments
    pub fn name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            NodeKind::Comment(_) => None,
        }
    }

    pub fn comment(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Comment(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Child elements of node with the given name, in document order
    pub fn child_elements<'a>(
        &'a self,
        node: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(node)
            .iter()
            .copied()
            .filter(move |child| self.name(*child) == Some(name))
    }

    pub fn find_child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.child_elements(node, name).next()
    }

    /// All elements below node (node excluded) in document order
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.name(id).is_some() {
                found.push(id);
                stack.extend(self.children(id).iter().rev().copied());
            }
        }
        found
    }

    /// Serialize the full tree, declaration included
    pub fn to_xml_string(&self) -> Result<String, IdfWriterError> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.extend_from_slice(XML_DECLARATION.as_bytes());
        {
            let mut writer = Writer::new_with_indent(&mut buffer, b' ', INDENT_SIZE);
            self.write_node(&mut writer, self.root())?;
        }
        buffer.push(b'\n');
        Ok(String::from_utf8(buffer)?)
    }

    fn write_node<W: Write>(&self, writer: &mut Writer<W>, id: NodeId) -> std::io::Result<()> {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
            }
            NodeKind::Element { name, attributes } => {
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in attributes.iter() {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if node.children.is_empty() {
                    writer.write_event(Event::Empty(start))?;
                } else {
                    writer.write_event(Event::Start(start))?;
                    for child in node.children.iter() {
                        self.write_node(writer, *child)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                }
            }
        }
        Ok(())
    }
}

/// Attribute text for a float: shortest round-trip form, integral values keep a trailing `.0`
pub fn float_attr(value: f64) -> String {
    format!("{value:?}")
}

/// Attribute text for a float with five decimal places
pub fn fixed_attr(value: f64) -> String {
    format!("{value:.5}")
}
