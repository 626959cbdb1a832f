//! A bounded view over one balanced region of a parent reader.

use std::sync::Arc;

use loom_node::{LineInfo, Node, NodeKind, TypeSystem};
use tracing::trace;

use crate::{NodeReader, StreamError, StreamErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Delimited by `StartMember` / `EndMember`.
    Member,
    /// Delimited by `StartObject` or `GetObject` / `EndObject`.
    Object,
}

/// Exposes only the region that starts at the parent's current node.
///
/// The first [`read`](NodeReader::read) does not move the parent: it exposes
/// the node the parent is already on. Later reads advance the parent and
/// track nesting; the node that closes the region is still exposed, and the
/// read after it reports end of stream without moving the parent. The parent
/// is therefore left on the closing node and can carry on with its siblings.
///
/// Before the first read and after the end, every accessor reports an empty
/// node rather than the parent's current one.
pub struct SubtreeReader<'a, R: NodeReader + ?Sized> {
    parent: &'a mut R,
    region: Region,
    depth: usize,
    first_read: bool,
    done: bool,
    closed: bool,
    empty: Node,
}

impl<'a, R: NodeReader + ?Sized> SubtreeReader<'a, R> {
    /// A reader over the region opened by the parent's current node.
    pub fn new(parent: &'a mut R) -> Self {
        let region = if parent.kind() == NodeKind::StartMember {
            Region::Member
        } else {
            Region::Object
        };
        Self {
            parent,
            region,
            depth: 0,
            first_read: true,
            done: false,
            closed: false,
            empty: Node::None,
        }
    }

    fn is_empty(&self) -> bool {
        self.first_read || self.done
    }

    fn opens(&self, kind: NodeKind) -> bool {
        match self.region {
            Region::Member => kind == NodeKind::StartMember,
            Region::Object => kind.opens_object(),
        }
    }

    fn closes(&self, kind: NodeKind) -> bool {
        match self.region {
            Region::Member => kind == NodeKind::EndMember,
            Region::Object => kind == NodeKind::EndObject,
        }
    }
}

impl<R: NodeReader + ?Sized> NodeReader for SubtreeReader<'_, R> {
    fn read(&mut self) -> Result<bool, StreamError> {
        if self.closed {
            return Err(StreamError::new(StreamErrorKind::ReaderClosed));
        }
        if self.done {
            return Ok(false);
        }
        if self.first_read {
            self.first_read = false;
            if self.parent.is_eof() || self.parent.kind() == NodeKind::None {
                self.done = true;
                return Ok(false);
            }
            self.depth = usize::from(self.opens(self.parent.kind()));
            trace!(region = ?self.region, kind = %self.parent.kind(), "subtree opened");
            return Ok(true);
        }
        if self.depth == 0 {
            // The region's closing node (or its only node) was the last one.
            self.done = true;
            return Ok(false);
        }
        if !self.parent.read()? {
            self.done = true;
            return Ok(false);
        }
        let kind = self.parent.kind();
        if self.opens(kind) {
            self.depth += 1;
        } else if self.closes(kind) {
            self.depth -= 1;
        }
        trace!(depth = self.depth, %kind, "subtree read");
        Ok(true)
    }

    fn node(&self) -> &Node {
        if self.is_empty() {
            &self.empty
        } else {
            self.parent.node()
        }
    }

    fn is_eof(&self) -> bool {
        self.done || self.parent.is_eof()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn schema(&self) -> Option<Arc<dyn TypeSystem>> {
        self.parent.schema()
    }

    fn has_line_info(&self) -> bool {
        self.parent.has_line_info()
    }

    fn line_info(&self) -> Option<LineInfo> {
        if self.is_empty() {
            None
        } else {
            self.parent.line_info()
        }
    }
}
