//! Sentinel nodes used only by the buffering machinery.

use loom_node::{LineInfo, Node};

/// A slot in a buffered stream: a real node or a sentinel.
///
/// Sentinels never reach consumers; readers absorb them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNode {
    Node(Node),
    StartOfStream,
    EndOfStream,
    EndOfAttributes,
    LineInfo(LineInfo),
}
