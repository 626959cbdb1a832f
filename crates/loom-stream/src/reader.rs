//! The pull protocol.

use std::sync::Arc;

use loom_node::{LineInfo, MemberId, NamespaceDeclaration, Node, NodeKind, TypeId, TypeSystem, Value};
use tracing::trace;

use crate::{StreamError, SubtreeReader};

/// A cursor over a node stream.
///
/// A fresh reader is positioned before the first node (`kind()` is
/// [`NodeKind::None`]); every successful [`read`](NodeReader::read) moves it
/// to the next node. Once closed, every `read` fails with
/// [`ReaderClosed`](crate::StreamErrorKind::ReaderClosed).
pub trait NodeReader {
    /// Advance to the next node. Returns `false` at the end of the stream.
    fn read(&mut self) -> Result<bool, StreamError>;

    /// The current node, [`Node::None`] before the first read and at the end.
    fn node(&self) -> &Node;

    /// Whether the last read hit the end of the stream.
    fn is_eof(&self) -> bool;

    /// Move the reader into its closed state.
    fn close(&mut self);

    /// Whether [`close`](NodeReader::close) was called.
    fn is_closed(&self) -> bool;

    /// Schema the stream was produced against, if any.
    fn schema(&self) -> Option<Arc<dyn TypeSystem>> {
        None
    }

    /// Whether the stream carries line positions.
    fn has_line_info(&self) -> bool {
        false
    }

    /// Position of the current node, when the stream carries line positions.
    fn line_info(&self) -> Option<LineInfo> {
        None
    }

    /// Kind of the current node.
    fn kind(&self) -> NodeKind {
        self.node().kind()
    }

    /// Type of the current `StartObject` node.
    fn type_id(&self) -> Option<&TypeId> {
        self.node().type_id()
    }

    /// Member of the current `StartMember` node.
    fn member(&self) -> Option<&MemberId> {
        self.node().member()
    }

    /// Payload of the current `Value` node.
    fn value(&self) -> Option<&Value> {
        self.node().value()
    }

    /// Declaration of the current `NamespaceDeclaration` node.
    fn namespace(&self) -> Option<&NamespaceDeclaration> {
        self.node().namespace()
    }

    /// Skip the current node and everything it encloses.
    ///
    /// On `StartObject`/`GetObject` this moves past the matching `EndObject`,
    /// on `StartMember` past the matching `EndMember`; nested regions of the
    /// same kind are balanced. On any other node it is a plain `read`.
    fn skip(&mut self) -> Result<bool, StreamError> {
        let kind = self.kind();
        if kind.opens_object() {
            skip_region(self, NodeKind::opens_object, NodeKind::EndObject)?;
        } else if kind == NodeKind::StartMember {
            skip_region(self, |k| k == NodeKind::StartMember, NodeKind::EndMember)?;
        }
        self.read()
    }

    /// A reader over the region starting at the current node.
    fn read_subtree(&mut self) -> SubtreeReader<'_, Self>
    where
        Self: Sized,
    {
        SubtreeReader::new(self)
    }
}

/// A reader over a random-access buffer.
pub trait IndexedReader: NodeReader {
    /// Number of nodes in the buffer.
    fn count(&self) -> usize;

    /// Index of the current node: `-1` before the stream, `count` after it.
    fn current_index(&self) -> isize;

    /// Reposition the reader.
    ///
    /// `-1` rewinds to before the first node, `count` moves past the last
    /// one, anything in between re-reads that node. Other values fail with
    /// [`IndexOutOfRange`](crate::StreamErrorKind::IndexOutOfRange).
    fn set_current_index(&mut self, index: isize) -> Result<(), StreamError>;
}

fn skip_region<R: NodeReader + ?Sized>(
    reader: &mut R,
    opens: fn(NodeKind) -> bool,
    closes: NodeKind,
) -> Result<(), StreamError> {
    let mut depth = 1usize;
    while depth > 0 {
        if !reader.read()? {
            trace!(depth, "stream ended inside skipped region");
            return Ok(());
        }
        let kind = reader.kind();
        if opens(kind) {
            depth += 1;
        } else if kind == closes {
            depth -= 1;
        }
    }
    Ok(())
}
