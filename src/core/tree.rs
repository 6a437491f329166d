//! core::tree
//!
//! The immutable error tree.
//!
//! # Design
//!
//! Failures collected during one commit attempt are reported as a tree of
//! [`ErrorNode`]s: a message plus an ordered sequence of child nodes. The
//! tree is built bottom-up and never mutated afterwards; both renderings
//! (indented text and JSON) are pure functions over the finished value.
//!
//! # Wire format
//!
//! The JSON encoding is part of the public interface and must not drift:
//!
//! - a node with no children serializes as a one-element array `[message]`
//! - a node with children serializes as `[message, [child, child, ...]]`
//!
//! ```text
//! ["Parent message", [["Child A"], ["Child B"]]]
//! ```

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from parsing the JSON encoding of an error tree.
#[derive(Debug, Error)]
pub enum TreeParseError {
    /// The input was not valid JSON or did not match the node shape.
    #[error("invalid error tree encoding: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// One node of an error tree: a message plus ordered children.
///
/// Leaves carry a message and no children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    message: String,
    children: Vec<ErrorNode>,
}

impl ErrorNode {
    /// Create a leaf node.
    pub fn leaf(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    pub fn with_children(message: impl Into<String>, children: Vec<ErrorNode>) -> Self {
        Self {
            message: message.into(),
            children,
        }
    }

    /// The node's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The node's children, in order.
    pub fn children(&self) -> &[ErrorNode] {
        &self.children
    }

    /// Whether the node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in the tree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ErrorNode::node_count).sum::<usize>()
    }

    /// Render the tree as indented text, two spaces per level.
    ///
    /// # Example
    ///
    /// ```
    /// use convoy::core::tree::ErrorNode;
    ///
    /// let tree = ErrorNode::with_children("parent", vec![ErrorNode::leaf("child")]);
    /// assert_eq!(tree.render_indented(), "parent\n  child");
    /// ```
    pub fn render_indented(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out.pop(); // drop the trailing newline
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&self.message);
        out.push('\n');
        for child in &self.children {
            child.render_into(depth + 1, out);
        }
    }

    /// Encode the tree as a JSON string in the documented wire format.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("error tree serialization is infallible")
    }

    /// Parse a tree from the documented JSON wire format.
    pub fn from_json_str(input: &str) -> Result<Self, TreeParseError> {
        Ok(serde_json::from_str(input)?)
    }
}

impl fmt::Display for ErrorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Serialize for ErrorNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.children.is_empty() {
            let mut seq = serializer.serialize_seq(Some(1))?;
            seq.serialize_element(&self.message)?;
            seq.end()
        } else {
            let mut seq = serializer.serialize_seq(Some(2))?;
            seq.serialize_element(&self.message)?;
            seq.serialize_element(&self.children)?;
            seq.end()
        }
    }
}

impl<'de> Deserialize<'de> for ErrorNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = ErrorNode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an error node encoded as [message] or [message, [children]]")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let message: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let children: Vec<ErrorNode> = seq.next_element()?.unwrap_or_default();
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                Ok(ErrorNode { message, children })
            }
        }

        deserializer.deserialize_seq(NodeVisitor)
    }
}
