//! Writer that appends into a buffer.

use loom_node::{LineInfo, MemberId, NamespaceDeclaration, Node, TypeId, Value};
use tracing::{debug, trace};

use crate::internal::StreamNode;
use crate::{NodeWriter, StreamError, StreamErrorKind};

/// Destination of a [`SinkWriter`].
pub trait Sink {
    fn push(&mut self, node: StreamNode) -> Result<(), StreamError>;
}

/// A [`NodeWriter`] that hands every node to a buffer.
///
/// Closing pushes an end-of-stream marker into the buffer; afterwards every
/// write fails with [`WriterClosed`](StreamErrorKind::WriterClosed).
pub struct SinkWriter<S> {
    sink: S,
    closed: bool,
    line_info: Option<LineInfo>,
}

impl<S: Sink> SinkWriter<S> {
    pub(crate) fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
            line_info: None,
        }
    }

    fn push(&mut self, node: Node) -> Result<(), StreamError> {
        self.ensure_open()?;
        trace!(%node, "buffer write");
        self.sink
            .push(StreamNode::Node(node))
            .map_err(|e| e.with_line_info(self.line_info))
    }

    fn ensure_open(&self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::new(StreamErrorKind::WriterClosed).with_line_info(self.line_info));
        }
        Ok(())
    }
}

impl<S: Sink> NodeWriter for SinkWriter<S> {
    type Error = StreamError;

    fn write_start_object(&mut self, ty: TypeId) -> Result<(), StreamError> {
        self.push(Node::StartObject(ty))
    }

    fn write_get_object(&mut self) -> Result<(), StreamError> {
        self.push(Node::GetObject)
    }

    fn write_end_object(&mut self) -> Result<(), StreamError> {
        self.push(Node::EndObject)
    }

    fn write_start_member(&mut self, member: MemberId) -> Result<(), StreamError> {
        self.push(Node::StartMember(member))
    }

    fn write_end_member(&mut self) -> Result<(), StreamError> {
        self.push(Node::EndMember)
    }

    fn write_value(&mut self, value: Value) -> Result<(), StreamError> {
        self.push(Node::Value(value))
    }

    fn write_namespace(&mut self, decl: NamespaceDeclaration) -> Result<(), StreamError> {
        self.push(Node::NamespaceDeclaration(decl))
    }

    fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("buffer writer closed");
        self.sink.push(StreamNode::EndOfStream)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn accepts_line_info(&self) -> bool {
        true
    }

    fn set_line_info(&mut self, line_info: LineInfo) -> Result<(), StreamError> {
        self.ensure_open()?;
        self.line_info = Some(line_info);
        self.sink.push(StreamNode::LineInfo(line_info))
    }
}
