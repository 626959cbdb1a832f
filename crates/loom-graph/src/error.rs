//! Object-graph construction errors.

use std::fmt;

use loom_names::{NameError, NameErrorKind};
use loom_node::{LineInfo, MemberId, NodeKind, TypeId};
use loom_stream::{StreamError, StreamErrorKind};

/// A failure while building or walking an object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphError {
    pub kind: GraphErrorKind,
    /// Position of the node being processed, when known.
    pub line_info: Option<LineInfo>,
}

impl GraphError {
    /// Create a new graph error.
    pub fn new(kind: GraphErrorKind) -> Self {
        Self {
            kind,
            line_info: None,
        }
    }

    /// Attach a position unless one is already known.
    pub fn with_line_info(mut self, line_info: Option<LineInfo>) -> Self {
        if self.line_info.is_none() {
            self.line_info = line_info;
        }
        self
    }
}

impl From<GraphErrorKind> for GraphError {
    fn from(kind: GraphErrorKind) -> Self {
        GraphError::new(kind)
    }
}

impl From<StreamError> for GraphError {
    fn from(err: StreamError) -> Self {
        GraphError {
            kind: GraphErrorKind::Stream(err.kind),
            line_info: err.line_info,
        }
    }
}

impl From<NameError> for GraphError {
    fn from(err: NameError) -> Self {
        GraphError::new(GraphErrorKind::Name(err.kind))
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(info) = &self.line_info {
            write!(f, " at {}", info)?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphError {}

/// Kind of graph error.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphErrorKind {
    Stream(StreamErrorKind),
    Name(NameErrorKind),
    /// A node that cannot appear at this point of the stream.
    UnexpectedNode {
        kind: NodeKind,
        expected: &'static str,
    },
    /// A member the object's type does not carry.
    UnknownMember { ty: TypeId, member: MemberId },
    /// Content written while no member is open.
    NoActiveMember(NodeKind),
    /// `GetObject` on a member holding no object.
    NothingToGet(MemberId),
    /// A member assigned more than once on the same object.
    DuplicateMember(MemberId),
    /// Names still unbound when the document completed.
    UnresolvedReferences(Vec<String>),
    /// A value could not be converted for its member.
    Conversion { member: MemberId, message: String },
    /// The stream ended with objects still open.
    UnclosedObject(usize),
    /// An unnamed object reachable from itself.
    CyclicGraph(TypeId),
    InvalidDeferredContent(String),
    /// An object that is neither an [`Instance`](crate::Instance) nor
    /// deferred content, so it has no node form.
    UnsupportedObject(String),
}

impl fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphErrorKind::Stream(kind) => write!(f, "{}", kind),
            GraphErrorKind::Name(kind) => write!(f, "{}", kind),
            GraphErrorKind::UnexpectedNode { kind, expected } => {
                write!(f, "unexpected {}, expected {}", kind, expected)
            }
            GraphErrorKind::UnknownMember { ty, member } => {
                write!(f, "type {} has no member {}", ty, member)
            }
            GraphErrorKind::NoActiveMember(kind) => write!(f, "{} outside of a member", kind),
            GraphErrorKind::NothingToGet(member) => {
                write!(f, "member {} holds no object to get", member)
            }
            GraphErrorKind::DuplicateMember(member) => {
                write!(f, "member {} is set more than once", member)
            }
            GraphErrorKind::UnresolvedReferences(names) => {
                write!(f, "unresolved references: {}", names.join(", "))
            }
            GraphErrorKind::Conversion { member, message } => {
                write!(f, "cannot convert value for {}: {}", member, message)
            }
            GraphErrorKind::UnclosedObject(depth) => {
                write!(f, "stream ended with {} open object(s)", depth)
            }
            GraphErrorKind::CyclicGraph(ty) => {
                write!(f, "object of type {} contains itself and has no name", ty)
            }
            GraphErrorKind::InvalidDeferredContent(reason) => {
                write!(f, "invalid deferred content: {}", reason)
            }
            GraphErrorKind::UnsupportedObject(object) => {
                write!(f, "cannot write object {} as nodes", object)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_keeps_position() {
        let err: GraphError = StreamError::new(StreamErrorKind::WriterClosed)
            .with_line_info(Some(LineInfo::new(2, 4)))
            .into();
        assert_eq!(err.to_string(), "writer is closed at line 2, column 4");
    }

    #[test]
    fn test_name_error_display() {
        let err: GraphError = NameError::new(NameErrorKind::DuplicateName("ok".into())).into();
        let err = err.with_line_info(Some(LineInfo::new(7, 1)));
        assert_eq!(
            err.to_string(),
            "name 'ok' is already registered to another object at line 7, column 1"
        );
    }

    #[test]
    fn test_unresolved_lists_names() {
        let err = GraphError::new(GraphErrorKind::UnresolvedReferences(vec!["a".into(), "b".into()]));
        assert_eq!(err.to_string(), "unresolved references: a, b");
    }
}
