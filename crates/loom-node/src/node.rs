//! The node: one step of a markup object-graph stream.

use std::fmt;

use crate::{MemberId, TypeId, Value};

/// Kind of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// No current node: before the first read or after the end of the stream.
    None,
    StartObject,
    /// Start of an object that is not created but retrieved from the
    /// enclosing member (e.g. a read-only collection property).
    GetObject,
    EndObject,
    StartMember,
    EndMember,
    Value,
    NamespaceDeclaration,
}

impl NodeKind {
    /// `StartObject` or `GetObject`: both are closed by `EndObject`.
    pub fn opens_object(self) -> bool {
        matches!(self, NodeKind::StartObject | NodeKind::GetObject)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::None => "None",
            NodeKind::StartObject => "StartObject",
            NodeKind::GetObject => "GetObject",
            NodeKind::EndObject => "EndObject",
            NodeKind::StartMember => "StartMember",
            NodeKind::EndMember => "EndMember",
            NodeKind::Value => "Value",
            NodeKind::NamespaceDeclaration => "NamespaceDeclaration",
        };
        f.write_str(name)
    }
}

/// Position of a node in the source text (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineInfo {
    pub line: u32,
    pub column: u32,
}

impl LineInfo {
    /// Create a new position.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for LineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A namespace declaration: `prefix` bound to `namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDeclaration {
    pub namespace: String,
    pub prefix: String,
}

impl NamespaceDeclaration {
    /// Bind `prefix` to `namespace`.
    pub fn new(namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: prefix.into(),
        }
    }
}

/// One step of the stream.
///
/// Payload accessors return `None` unless the node is of the matching kind;
/// asking a `Value` node for its type is not an error, just absent data.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    #[default]
    None,
    StartObject(TypeId),
    GetObject,
    EndObject,
    StartMember(MemberId),
    EndMember,
    Value(Value),
    NamespaceDeclaration(NamespaceDeclaration),
}

impl Node {
    /// The node's kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::None => NodeKind::None,
            Node::StartObject(_) => NodeKind::StartObject,
            Node::GetObject => NodeKind::GetObject,
            Node::EndObject => NodeKind::EndObject,
            Node::StartMember(_) => NodeKind::StartMember,
            Node::EndMember => NodeKind::EndMember,
            Node::Value(_) => NodeKind::Value,
            Node::NamespaceDeclaration(_) => NodeKind::NamespaceDeclaration,
        }
    }

    /// The type of a `StartObject` node.
    pub fn type_id(&self) -> Option<&TypeId> {
        match self {
            Node::StartObject(ty) => Some(ty),
            _ => None,
        }
    }

    /// The member of a `StartMember` node.
    pub fn member(&self) -> Option<&MemberId> {
        match self {
            Node::StartMember(member) => Some(member),
            _ => None,
        }
    }

    /// The payload of a `Value` node.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The declaration of a `NamespaceDeclaration` node.
    pub fn namespace(&self) -> Option<&NamespaceDeclaration> {
        match self {
            Node::NamespaceDeclaration(decl) => Some(decl),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::StartObject(ty) => write!(f, "StartObject {}", ty),
            Node::StartMember(member) => write!(f, "StartMember {}", member),
            Node::Value(value) => write!(f, "Value {}", value),
            Node::NamespaceDeclaration(decl) => {
                write!(f, "NamespaceDeclaration {}={}", decl.prefix, decl.namespace)
            }
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_payload_is_absent() {
        let node = Node::Value(Value::from("hello"));
        assert_eq!(node.kind(), NodeKind::Value);
        assert!(node.type_id().is_none());
        assert!(node.member().is_none());
        assert!(node.namespace().is_none());
        assert_eq!(node.value().and_then(|v| v.as_str()), Some("hello"));
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(Node::default().kind(), NodeKind::None);
    }

    #[test]
    fn test_display() {
        let ty = TypeId::new("Window");
        assert_eq!(Node::StartObject(ty.clone()).to_string(), "StartObject Window");
        assert_eq!(
            Node::StartMember(MemberId::new(ty, "Title")).to_string(),
            "StartMember Window.Title"
        );
        assert_eq!(Node::EndObject.to_string(), "EndObject");
        assert_eq!(
            Node::NamespaceDeclaration(NamespaceDeclaration::new("urn:ui", "ui")).to_string(),
            "NamespaceDeclaration ui=urn:ui"
        );
    }

    #[test]
    fn test_opens_object() {
        assert!(NodeKind::StartObject.opens_object());
        assert!(NodeKind::GetObject.opens_object());
        assert!(!NodeKind::StartMember.opens_object());
    }
}
