use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{SourceSpan, Tag};

/// Stable index of a node inside its `QuestDocument` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNode {
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
    /// Concatenated descendant text, markup stripped.
    pub text: String,
    /// Serialized inner markup; only meaningful for `Text` and `Instruction`.
    pub markup: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub span: Option<SourceSpan>,
}

impl DocumentNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: BTreeMap::new(),
            text: String::new(),
            markup: String::new(),
            children: Vec::new(),
            parent: None,
            span: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets both the plain text and the markup to `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self.markup = self.text.clone();
        self
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn on(&self) -> Option<&str> {
        self.attr("on")
    }

    pub fn condition(&self) -> Option<&str> {
        self.attr("condition")
    }
}

/// Arena-backed quest tree. Parent links are indices, never owning references.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestDocument {
    nodes: Vec<DocumentNode>,
    root: NodeId,
}

impl QuestDocument {
    pub fn new(mut root: DocumentNode) -> Self {
        root.parent = None;
        root.children.clear();
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Quest-level attributes (title, summary, author, ...).
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.node(self.root).attributes
    }

    pub fn get(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id.0)
    }

    /// Ids handed out by this document are always valid; foreign ids panic.
    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    pub fn tag(&self, id: NodeId) -> Tag {
        self.node(id).tag
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn append(&mut self, parent: NodeId, mut node: DocumentNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Pre-order walk of `from` and everything below it, in document order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }
}
