//! FIFO buffer for producer/consumer handoff.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use loom_node::{Node, TypeSystem};
use tracing::trace;

use crate::internal::StreamNode;
use crate::sink::Sink;
use crate::{SequentialReader, SinkWriter, StreamError};

/// Writer enqueueing into a [`NodeQueue`].
pub type QueueWriter = SinkWriter<QueueSink>;

/// Reader dequeueing from a [`NodeQueue`].
pub type QueueReader = SequentialReader<'static>;

struct QueueState {
    slots: VecDeque<StreamNode>,
    has_line_info: bool,
    started: bool,
}

/// A single-pass FIFO node buffer.
///
/// There is no phase gate: writes and reads may interleave, so a consumer can
/// run one node behind its producer. A reader that finds the queue empty
/// reports end of stream; reading again after more nodes were written picks
/// them up.
#[derive(Clone)]
pub struct NodeQueue {
    state: Rc<RefCell<QueueState>>,
    schema: Option<Arc<dyn TypeSystem>>,
}

/// Handle the [`QueueWriter`] pushes through.
pub struct QueueSink(Rc<RefCell<QueueState>>);

impl NodeQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState {
                slots: VecDeque::new(),
                has_line_info: false,
                started: false,
            })),
            schema: None,
        }
    }

    /// Create an empty queue whose readers report `schema`.
    pub fn with_schema(schema: Arc<dyn TypeSystem>) -> Self {
        let mut queue = Self::new();
        queue.schema = Some(schema);
        queue
    }

    /// A writer appending to the queue.
    pub fn writer(&self) -> QueueWriter {
        SinkWriter::new(QueueSink(self.state.clone()))
    }

    /// A reader consuming from the front of the queue.
    pub fn reader(&self) -> QueueReader {
        let state = self.state.clone();
        let flag = self.state.clone();
        let reader = SequentialReader::from_stream(move || {
            state
                .borrow_mut()
                .slots
                .pop_front()
                .unwrap_or(StreamNode::EndOfStream)
        })
        .with_line_info_flag(move || flag.borrow().has_line_info);
        match &self.schema {
            Some(schema) => reader.with_schema(schema.clone()),
            None => reader,
        }
    }

    /// Append `node` directly.
    pub fn enqueue(&self, node: Node) {
        push_slot(&self.state, StreamNode::Node(node));
    }

    /// Next node, or `None` once the queue holds no more nodes.
    ///
    /// Position markers are discarded.
    pub fn dequeue(&self) -> Option<Node> {
        let mut state = self.state.borrow_mut();
        while let Some(slot) = state.slots.pop_front() {
            match slot {
                StreamNode::Node(node) => return Some(node),
                StreamNode::EndOfStream => return None,
                _ => {}
            }
        }
        None
    }

    /// Number of buffered slots, position markers included.
    pub fn len(&self) -> usize {
        self.state.borrow().slots.len()
    }

    /// Whether no slot is buffered.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().slots.is_empty()
    }

    /// Whether anything was ever written.
    pub fn has_started(&self) -> bool {
        self.state.borrow().started
    }
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn push_slot(state: &RefCell<QueueState>, slot: StreamNode) {
    let mut state = state.borrow_mut();
    state.started = true;
    if let StreamNode::LineInfo(_) = slot {
        state.has_line_info = true;
    }
    trace!(queued = state.slots.len() + 1, "enqueue");
    state.slots.push_back(slot);
}

impl Sink for QueueSink {
    fn push(&mut self, node: StreamNode) -> Result<(), StreamError> {
        push_slot(&self.0, node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use loom_node::{LineInfo, MemberId, NodeKind, TypeId, Value};

    use super::*;
    use crate::{NodeReader, NodeWriter, StreamErrorKind};

    #[test]
    fn test_object_with_member_round_trip() {
        let queue = NodeQueue::new();
        let mut writer = queue.writer();
        let ty = TypeId::new("T");
        writer.write_start_object(ty.clone()).unwrap();
        writer.write_start_member(MemberId::new(ty.clone(), "M")).unwrap();
        writer.write_value(Value::from("hello")).unwrap();
        writer.write_end_member().unwrap();
        writer.write_end_object().unwrap();
        writer.close().unwrap();

        let mut reader = queue.reader();
        let expected = [
            NodeKind::StartObject,
            NodeKind::StartMember,
            NodeKind::Value,
            NodeKind::EndMember,
            NodeKind::EndObject,
        ];
        for kind in expected {
            assert!(reader.read().unwrap());
            assert_eq!(reader.kind(), kind);
            assert!(!reader.is_eof());
        }
        assert!(!reader.read().unwrap());
        assert!(reader.is_eof());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_interleaved_producer_and_consumer() {
        let queue = NodeQueue::new();
        let mut writer = queue.writer();
        let mut reader = queue.reader();

        writer.write_start_object(TypeId::new("A")).unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.kind(), NodeKind::StartObject);

        // Consumer caught up with the producer.
        assert!(!reader.read().unwrap());
        assert!(reader.is_eof());

        writer.set_line_info(LineInfo::new(4, 2)).unwrap();
        writer.write_end_object().unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.kind(), NodeKind::EndObject);
        assert_eq!(reader.line_info(), Some(LineInfo::new(4, 2)));
    }

    #[test]
    fn test_reader_created_early_sees_positions() {
        let queue = NodeQueue::new();
        let mut reader = queue.reader();
        assert!(!reader.has_line_info());

        let mut writer = queue.writer();
        writer.set_line_info(LineInfo::new(2, 3)).unwrap();
        writer.write_start_object(TypeId::new("A")).unwrap();
        writer.write_end_object().unwrap();
        assert!(reader.has_line_info());

        let copy = NodeQueue::new();
        crate::transform(&mut reader, &mut copy.writer(), true).unwrap();
        let mut copied = copy.reader();
        assert!(copied.read().unwrap());
        assert_eq!(copied.line_info(), Some(LineInfo::new(2, 3)));
    }

    #[test]
    fn test_enqueue_dequeue() {
        let queue = NodeQueue::new();
        assert!(!queue.has_started());
        queue.enqueue(Node::GetObject);
        queue.enqueue(Node::EndObject);
        assert!(queue.has_started());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue(), Some(Node::GetObject));
        assert_eq!(queue.dequeue(), Some(Node::EndObject));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_closed_writer_rejects_writes() {
        let queue = NodeQueue::new();
        let mut writer = queue.writer();
        writer.close().unwrap();
        let err = writer.write_end_member().unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::WriterClosed);
        // Only the end-of-stream marker made it in.
        assert_eq!(queue.len(), 1);
    }
}
