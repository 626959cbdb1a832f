//! Stream protocol errors.

use std::fmt;

use loom_node::{LineInfo, NodeKind};

/// A violation of the reader/writer/buffer protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    /// Position of the node being processed, when known.
    pub line_info: Option<LineInfo>,
}

impl StreamError {
    /// Create a new stream error.
    pub fn new(kind: StreamErrorKind) -> Self {
        Self {
            kind,
            line_info: None,
        }
    }

    /// Attach a position, unless one is already set.
    pub fn with_line_info(mut self, line_info: Option<LineInfo>) -> Self {
        if self.line_info.is_none() {
            self.line_info = line_info;
        }
        self
    }
}

impl From<StreamErrorKind> for StreamError {
    fn from(kind: StreamErrorKind) -> Self {
        StreamError::new(kind)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(info) = &self.line_info {
            write!(f, " at {}", info)?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamError {}

/// Kind of stream error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamErrorKind {
    /// Write attempted after the writer was closed.
    WriterClosed,
    /// Read attempted after the reader was closed.
    ReaderClosed,
    /// Index outside `-1..=count`.
    IndexOutOfRange { index: isize, count: usize },
    /// Write attempted on a buffer that has entered its read phase.
    WriteAfterFreeze,
    /// Read attempted on a buffer that is still being written.
    ReadBeforeFreeze,
    /// The buffer was frozen without a schema.
    MissingSchema,
    /// A node kind the operation cannot dispatch.
    UnsupportedNode(NodeKind),
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorKind::WriterClosed => write!(f, "writer is closed"),
            StreamErrorKind::ReaderClosed => write!(f, "reader is closed"),
            StreamErrorKind::IndexOutOfRange { index, count } => {
                write!(f, "index {} is out of range for {} nodes", index, count)
            }
            StreamErrorKind::WriteAfterFreeze => {
                write!(f, "cannot write to a buffer that is being read")
            }
            StreamErrorKind::ReadBeforeFreeze => {
                write!(f, "close the writer before reading the buffer")
            }
            StreamErrorKind::MissingSchema => write!(f, "no schema associated with the buffer"),
            StreamErrorKind::UnsupportedNode(kind) => write!(f, "unsupported node kind {}", kind),
        }
    }
}
