//! Reader over a pull function.

use std::sync::Arc;

use loom_node::{LineInfo, Node, NodeKind, TypeSystem};
use tracing::trace;

use crate::internal::StreamNode;
use crate::{NodeReader, StreamError, StreamErrorKind};

/// A forward-only reader that pulls one slot at a time.
///
/// Sentinel slots never surface: line positions are absorbed into the
/// reader's position state, other markers are skipped, and control returns to
/// the caller only on a real node or at the end of the stream.
pub struct SequentialReader<'a> {
    next: Box<dyn FnMut() -> StreamNode + 'a>,
    current: Node,
    eof: bool,
    closed: bool,
    line_info: Option<LineInfo>,
    has_line_info: bool,
    /// Shared with the buffer being read; set once its producer wrote a
    /// position.
    line_info_flag: Option<Box<dyn Fn() -> bool + 'a>>,
    schema: Option<Arc<dyn TypeSystem>>,
}

impl<'a> SequentialReader<'a> {
    /// Read nodes from `pull` until it returns `None`.
    pub fn from_fn(mut pull: impl FnMut() -> Option<Node> + 'a) -> Self {
        Self::from_stream(move || match pull() {
            Some(node) => StreamNode::Node(node),
            None => StreamNode::EndOfStream,
        })
    }

    /// Read the given nodes in order.
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: 'a,
    {
        let mut iter = nodes.into_iter();
        Self::from_fn(move || iter.next())
    }

    pub(crate) fn from_stream(pull: impl FnMut() -> StreamNode + 'a) -> Self {
        Self {
            next: Box::new(pull),
            current: Node::None,
            eof: false,
            closed: false,
            line_info: None,
            has_line_info: false,
            line_info_flag: None,
            schema: None,
        }
    }

    /// Report `schema` as the reader's type system.
    pub fn with_schema(mut self, schema: Arc<dyn TypeSystem>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub(crate) fn with_line_info_flag(mut self, flag: impl Fn() -> bool + 'a) -> Self {
        self.line_info_flag = Some(Box::new(flag));
        self
    }
}

impl NodeReader for SequentialReader<'_> {
    fn read(&mut self) -> Result<bool, StreamError> {
        if self.closed {
            return Err(StreamError::new(StreamErrorKind::ReaderClosed));
        }
        loop {
            match (self.next)() {
                StreamNode::Node(node) if node.kind() != NodeKind::None => {
                    trace!(%node, "read");
                    self.current = node;
                    self.eof = false;
                    return Ok(true);
                }
                StreamNode::LineInfo(info) => {
                    self.line_info = Some(info);
                    self.has_line_info = true;
                }
                StreamNode::EndOfStream => {
                    self.current = Node::None;
                    self.eof = true;
                    return Ok(false);
                }
                StreamNode::Node(_) | StreamNode::StartOfStream | StreamNode::EndOfAttributes => {}
            }
        }
    }

    fn node(&self) -> &Node {
        &self.current
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = Node::None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn schema(&self) -> Option<Arc<dyn TypeSystem>> {
        self.schema.clone()
    }

    fn has_line_info(&self) -> bool {
        self.has_line_info || self.line_info_flag.as_ref().is_some_and(|flag| flag())
    }

    fn line_info(&self) -> Option<LineInfo> {
        if self.has_line_info() && !self.eof {
            self.line_info
        } else {
            None
        }
    }
}
