//! Record-and-replay buffer with random access.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use loom_node::{LineInfo, Node, NodeKind, TypeSystem};
use tracing::{debug, trace};

use crate::internal::StreamNode;
use crate::sink::Sink;
use crate::{IndexedReader, NodeReader, SinkWriter, StreamError, StreamErrorKind};

/// Writer appending into a [`NodeList`]. Closing it freezes the list.
pub type ListWriter<'a> = SinkWriter<&'a mut NodeList>;

/// An ordered node buffer with two phases.
///
/// In the write phase nodes are appended (usually through
/// [`NodeList::writer`]). Freezing the list (closing its writer, or calling
/// [`NodeList::freeze`]) switches it to the read phase, where it can be
/// replayed any number of times through random-access readers. The only way
/// back is [`NodeList::clear`], which also discards the content.
pub struct NodeList {
    nodes: Vec<Node>,
    /// Sparse positions: `(first node index it applies to, position)`,
    /// ordered by index.
    line_marks: Vec<(usize, LineInfo)>,
    schema: Option<Arc<dyn TypeSystem>>,
    frozen: bool,
}

impl NodeList {
    /// Create an empty list with no schema.
    ///
    /// A schema must be supplied with [`NodeList::set_schema`] before the
    /// list can be frozen.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            line_marks: Vec::new(),
            schema: None,
            frozen: false,
        }
    }

    /// Create an empty list using `schema`.
    pub fn with_schema(schema: Arc<dyn TypeSystem>) -> Self {
        let mut list = Self::new();
        list.schema = Some(schema);
        list
    }

    /// Set the type system required to freeze the list.
    pub fn set_schema(&mut self, schema: Arc<dyn TypeSystem>) {
        self.schema = Some(schema);
    }

    /// The list's type system, if set.
    pub fn schema(&self) -> Option<&Arc<dyn TypeSystem>> {
        self.schema.as_ref()
    }

    /// A writer appending to this list.
    pub fn writer(&mut self) -> ListWriter<'_> {
        SinkWriter::new(self)
    }

    /// Append a node. Only valid in the write phase.
    pub fn append(&mut self, node: Node) -> Result<(), StreamError> {
        if self.frozen {
            return Err(StreamError::new(StreamErrorKind::WriteAfterFreeze));
        }
        if node.kind() == NodeKind::None {
            return Err(StreamError::new(StreamErrorKind::UnsupportedNode(NodeKind::None)));
        }
        trace!(index = self.nodes.len(), %node, "append");
        self.nodes.push(node);
        Ok(())
    }

    /// Record the position of the next appended node.
    pub fn append_line_info(&mut self, line_info: LineInfo) -> Result<(), StreamError> {
        if self.frozen {
            return Err(StreamError::new(StreamErrorKind::WriteAfterFreeze));
        }
        let index = self.nodes.len();
        match self.line_marks.last_mut() {
            Some((last, info)) if *last == index => *info = line_info,
            _ => self.line_marks.push((index, line_info)),
        }
        Ok(())
    }

    /// Switch to the read phase.
    pub fn freeze(&mut self) -> Result<(), StreamError> {
        if self.frozen {
            return Ok(());
        }
        if self.schema.is_none() {
            return Err(StreamError::new(StreamErrorKind::MissingSchema));
        }
        self.frozen = true;
        debug!(count = self.nodes.len(), lines = self.line_marks.len(), "node list frozen");
        Ok(())
    }

    /// Whether writing has finished and the list can be read.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Discard the content and return to the write phase.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.line_marks.clear();
        self.frozen = false;
        debug!("node list cleared");
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any position was recorded.
    pub fn has_line_info(&self) -> bool {
        !self.line_marks.is_empty()
    }

    /// The node at `index`. Only valid in the read phase.
    pub fn get(&self, index: usize) -> Result<&Node, StreamError> {
        if !self.frozen {
            return Err(StreamError::new(StreamErrorKind::ReadBeforeFreeze));
        }
        self.nodes.get(index).ok_or_else(|| {
            StreamError::new(StreamErrorKind::IndexOutOfRange {
                index: index as isize,
                count: self.nodes.len(),
            })
        })
    }

    /// Position in effect for the node at `index`.
    pub fn line_info_at(&self, index: usize) -> Option<LineInfo> {
        let after = self.line_marks.partition_point(|(start, _)| *start <= index);
        after.checked_sub(1).map(|i| self.line_marks[i].1)
    }

    /// A reader replaying this list.
    pub fn reader(&self) -> Result<ListReader<&NodeList>, StreamError> {
        ListReader::new(self)
    }

    /// A reader that owns this list.
    pub fn into_reader(self) -> Result<ListReader<NodeList>, StreamError> {
        ListReader::new(self)
    }
}

impl Default for NodeList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeList")
            .field("nodes", &self.nodes)
            .field("line_marks", &self.line_marks)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}

impl Sink for &mut NodeList {
    fn push(&mut self, node: StreamNode) -> Result<(), StreamError> {
        match node {
            StreamNode::Node(node) => self.append(node),
            StreamNode::LineInfo(info) => self.append_line_info(info),
            StreamNode::EndOfStream => self.freeze(),
            StreamNode::StartOfStream | StreamNode::EndOfAttributes => Ok(()),
        }
    }
}

/// Random-access reader over a frozen [`NodeList`].
pub struct ListReader<L> {
    list: L,
    index: isize,
    current: Node,
    line_info: Option<LineInfo>,
    eof: bool,
    closed: bool,
}

impl<L: Borrow<NodeList>> ListReader<L> {
    fn new(list: L) -> Result<Self, StreamError> {
        let nodes = list.borrow();
        if !nodes.frozen {
            return Err(StreamError::new(StreamErrorKind::ReadBeforeFreeze));
        }
        if nodes.schema.is_none() {
            return Err(StreamError::new(StreamErrorKind::MissingSchema));
        }
        Ok(Self {
            list,
            index: -1,
            current: Node::None,
            line_info: None,
            eof: false,
            closed: false,
        })
    }

    /// The list being replayed.
    pub fn list(&self) -> &NodeList {
        self.list.borrow()
    }
}

impl<L: Borrow<NodeList>> NodeReader for ListReader<L> {
    fn read(&mut self) -> Result<bool, StreamError> {
        if self.closed {
            return Err(StreamError::new(StreamErrorKind::ReaderClosed));
        }
        let list = self.list.borrow();
        let count = list.nodes.len() as isize;
        if self.index < count - 1 {
            self.index += 1;
            let index = self.index as usize;
            self.current = list.nodes[index].clone();
            self.line_info = list.line_info_at(index);
            self.eof = false;
            trace!(index, node = %self.current, "replay");
            Ok(true)
        } else {
            self.index = count;
            self.current = Node::None;
            self.line_info = None;
            self.eof = true;
            Ok(false)
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
        self.list.borrow().schema.clone()
    }

    fn has_line_info(&self) -> bool {
        self.list.borrow().has_line_info()
    }

    fn line_info(&self) -> Option<LineInfo> {
        self.line_info
    }
}

impl<L: Borrow<NodeList>> IndexedReader for ListReader<L> {
    fn count(&self) -> usize {
        self.list.borrow().nodes.len()
    }

    fn current_index(&self) -> isize {
        self.index
    }

    fn set_current_index(&mut self, index: isize) -> Result<(), StreamError> {
        let count = self.count();
        if index < -1 || index > count as isize {
            return Err(StreamError::new(StreamErrorKind::IndexOutOfRange { index, count }));
        }
        if index == -1 {
            self.index = -1;
            self.current = Node::None;
            self.line_info = None;
            self.eof = false;
            return Ok(());
        }
        self.index = index - 1;
        self.read()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use loom_node::{MemberId, Schema, TypeId, Value};

    use super::*;
    use crate::NodeWriter;

    fn schema() -> Arc<dyn TypeSystem> {
        Arc::new(Schema::new())
    }

    fn sample(list: &mut NodeList) {
        let ty = TypeId::new("Label");
        let mut writer = list.writer();
        writer.set_line_info(LineInfo::new(1, 1)).unwrap();
        writer.write_start_object(ty.clone()).unwrap();
        writer.set_line_info(LineInfo::new(1, 8)).unwrap();
        writer.write_start_member(MemberId::new(ty, "Text")).unwrap();
        writer.write_value(Value::from("hi")).unwrap();
        writer.write_end_member().unwrap();
        writer.write_end_object().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_write_then_replay() {
        let mut list = NodeList::with_schema(schema());
        sample(&mut list);
        assert!(list.is_frozen());
        assert_eq!(list.len(), 5);

        let mut reader = list.reader().unwrap();
        assert!(reader.has_line_info());
        assert!(reader.read().unwrap());
        assert_eq!(reader.kind(), NodeKind::StartObject);
        assert_eq!(reader.line_info(), Some(LineInfo::new(1, 1)));
        assert!(reader.read().unwrap());
        assert_eq!(reader.line_info(), Some(LineInfo::new(1, 8)));
        assert!(reader.read().unwrap());
        assert_eq!(reader.value(), Some(&Value::from("hi")));
        assert_eq!(reader.line_info(), Some(LineInfo::new(1, 8)));
    }

    #[test]
    fn test_no_reads_before_freeze() {
        let mut list = NodeList::with_schema(schema());
        list.append(Node::GetObject).unwrap();
        assert_eq!(
            list.reader().err().map(|e| e.kind),
            Some(StreamErrorKind::ReadBeforeFreeze)
        );
        assert_eq!(
            list.get(0).unwrap_err().kind,
            StreamErrorKind::ReadBeforeFreeze
        );
    }

    #[test]
    fn test_no_writes_after_freeze() {
        let mut list = NodeList::with_schema(schema());
        list.freeze().unwrap();
        assert_eq!(
            list.append(Node::EndObject).unwrap_err().kind,
            StreamErrorKind::WriteAfterFreeze
        );
    }

    #[test]
    fn test_freeze_requires_schema() {
        let mut list = NodeList::new();
        list.append(Node::EndObject).unwrap();
        assert_eq!(list.freeze().unwrap_err().kind, StreamErrorKind::MissingSchema);
        list.set_schema(schema());
        list.freeze().unwrap();
        assert_eq!(list.get(0).unwrap(), &Node::EndObject);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut list = NodeList::with_schema(schema());
        sample(&mut list);
        assert_eq!(
            list.get(5).unwrap_err().kind,
            StreamErrorKind::IndexOutOfRange { index: 5, count: 5 }
        );
    }

    #[test]
    fn test_clear_returns_to_write_phase() {
        let mut list = NodeList::with_schema(schema());
        sample(&mut list);
        list.clear();
        assert!(!list.is_frozen());
        assert!(list.is_empty());
        assert!(!list.has_line_info());
        list.append(Node::GetObject).unwrap();
    }

    #[test]
    fn test_seek() {
        let mut list = NodeList::with_schema(schema());
        sample(&mut list);
        let mut reader = list.reader().unwrap();

        reader.set_current_index(2).unwrap();
        assert_eq!(reader.current_index(), 2);
        assert_eq!(reader.kind(), NodeKind::Value);

        reader.set_current_index(-1).unwrap();
        assert_eq!(reader.kind(), NodeKind::None);
        assert!(!reader.is_eof());
        assert!(reader.read().unwrap());
        assert_eq!(reader.kind(), NodeKind::StartObject);

        reader.set_current_index(5).unwrap();
        assert!(reader.is_eof());
        assert_eq!(reader.current_index(), 5);
        assert!(!reader.read().unwrap());

        let err = reader.set_current_index(6).unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::IndexOutOfRange { index: 6, count: 5 });
        assert!(reader.set_current_index(-2).is_err());
    }

    #[test]
    fn test_writer_closed() {
        let mut list = NodeList::with_schema(schema());
        let mut writer = list.writer();
        writer.close().unwrap();
        assert!(writer.is_closed());
        let err = writer.write_value(Value::Null).unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::WriterClosed);
        assert_eq!(err.to_string(), "writer is closed");
        let err = writer.write_start_object(TypeId::new("A")).unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::WriterClosed);
    }

    #[test]
    fn test_owned_reader() {
        let mut list = NodeList::with_schema(schema());
        sample(&mut list);
        let mut reader = list.into_reader().unwrap();
        let mut count = 0;
        while reader.read().unwrap() {
            count += 1;
        }
        assert_eq!(count, reader.list().len());
    }
}
