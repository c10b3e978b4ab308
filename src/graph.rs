//! Typed representation of a ComfyUI API-format workflow.
//!
//! A document is an ordered mapping of node id to node. Node inputs are either literal
//! JSON values or links to another node's numbered output slot, serialized the way
//! ComfyUI expects them: `"model": ["4", 0]`.

use crate::error::AssembleError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Reference to output slot `slot` of node `node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u32)", into = "(String, u32)")]
pub struct NodeLink {
    pub node_id: String,
    pub slot: u32,
}

impl NodeLink {
    pub fn new(node_id: impl Into<String>, slot: u32) -> Self {
        Self {
            node_id: node_id.into(),
            slot,
        }
    }
}

impl From<(String, u32)> for NodeLink {
    fn from((node_id, slot): (String, u32)) -> Self {
        Self { node_id, slot }
    }
}

impl From<NodeLink> for (String, u32) {
    fn from(link: NodeLink) -> Self {
        (link.node_id, link.slot)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeLink),
    Literal(Value),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&NodeLink> {
        match self {
            Self::Link(link) => Some(link),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Link(_) => None,
            Self::Literal(value) => Some(value),
        }
    }
}

/// Insertion-ordered node inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs(Vec<(String, InputValue)>);

impl NodeInputs {
    /// Sets `name`, replacing an existing entry in place.
    pub fn set(&mut self, name: &str, value: InputValue) {
        match self.0.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl Serialize for NodeInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMeta {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub inputs: NodeInputs,
    pub class_type: String,
    #[serde(rename = "_meta")]
    pub meta: NodeMeta,
}

impl GraphNode {
    pub fn new(class_type: &str, title: &str) -> Self {
        Self {
            inputs: NodeInputs::default(),
            class_type: class_type.to_string(),
            meta: NodeMeta {
                title: title.to_string(),
            },
        }
    }

    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs.set(name, InputValue::Literal(value.into()));
        self
    }

    pub fn with_link(mut self, name: &str, link: NodeLink) -> Self {
        self.inputs.set(name, InputValue::Link(link));
        self
    }

    pub fn set_link(&mut self, name: &str, link: NodeLink) {
        self.inputs.set(name, InputValue::Link(link));
    }

    pub fn link(&self, name: &str) -> Option<&NodeLink> {
        self.inputs.get(name).and_then(InputValue::as_link)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).and_then(InputValue::as_literal)
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }
}

/// A workflow graph keyed by node id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDocument {
    nodes: Vec<(String, GraphNode)>,
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, replacing any node already registered under `id`.
    pub fn insert(&mut self, id: impl Into<String>, node: GraphNode) {
        let id = id.into();
        match self.nodes.iter_mut().find(|(key, _)| *key == id) {
            Some((_, existing)) => *existing = node,
            None => self.nodes.push((id, node)),
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, node)| node)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes
            .iter_mut()
            .find(|(key, _)| key == id)
            .map(|(_, node)| node)
    }

    /// Like [`GraphDocument::node_mut`], but reports a missing node as an error.
    pub fn require_mut(&mut self, id: &str) -> Result<&mut GraphNode, AssembleError> {
        self.node_mut(id)
            .ok_or_else(|| AssembleError::MissingNode(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(id, _)| id.as_str())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, &GraphNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every link in the document as `(target node id, input name, link)`.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str, &NodeLink)> {
        self.nodes.iter().flat_map(|(id, node)| {
            node.inputs.iter().filter_map(move |(name, value)| {
                value.as_link().map(|link| (id.as_str(), name, link))
            })
        })
    }

    /// Checks that every link points at a node present in this document.
    pub fn validate_links(&self) -> Result<(), AssembleError> {
        for (target, _, link) in self.links() {
            if !self.contains(&link.node_id) {
                return Err(AssembleError::DanglingLink {
                    source_node_id: link.node_id.clone(),
                    target_node_id: target.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for GraphDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (id, node) in &self.nodes {
            map.serialize_entry(id, node)?;
        }
        map.end()
    }
}
