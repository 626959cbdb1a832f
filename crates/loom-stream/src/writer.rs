//! The push protocol.

use loom_node::{LineInfo, MemberId, NamespaceDeclaration, Node, NodeKind, TypeId, Value};
use tracing::debug;

use crate::{NodeReader, StreamError, StreamErrorKind};

/// A consumer of a node stream.
///
/// After [`close`](NodeWriter::close) every write fails with
/// [`WriterClosed`](StreamErrorKind::WriterClosed).
pub trait NodeWriter {
    type Error: From<StreamError>;

    /// Open a new object of type `ty`.
    fn write_start_object(&mut self, ty: TypeId) -> Result<(), Self::Error>;

    /// Open the object already held by the current member.
    fn write_get_object(&mut self) -> Result<(), Self::Error>;

    /// Close the innermost object.
    fn write_end_object(&mut self) -> Result<(), Self::Error>;

    /// Open `member` on the innermost object.
    fn write_start_member(&mut self, member: MemberId) -> Result<(), Self::Error>;

    /// Close the open member.
    fn write_end_member(&mut self) -> Result<(), Self::Error>;

    /// Write a value into the open member.
    fn write_value(&mut self, value: Value) -> Result<(), Self::Error>;

    /// Declare a namespace prefix.
    fn write_namespace(&mut self, decl: NamespaceDeclaration) -> Result<(), Self::Error>;

    /// Terminate the stream.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Whether the writer was closed.
    fn is_closed(&self) -> bool;

    /// Whether [`set_line_info`](NodeWriter::set_line_info) is recorded.
    fn accepts_line_info(&self) -> bool {
        false
    }

    /// Position of the next node written.
    fn set_line_info(&mut self, _line_info: LineInfo) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Write `node` through the matching `write_*` call.
    fn write(&mut self, node: Node) -> Result<(), Self::Error> {
        match node {
            Node::StartObject(ty) => self.write_start_object(ty),
            Node::GetObject => self.write_get_object(),
            Node::EndObject => self.write_end_object(),
            Node::StartMember(member) => self.write_start_member(member),
            Node::EndMember => self.write_end_member(),
            Node::Value(value) => self.write_value(value),
            Node::NamespaceDeclaration(decl) => self.write_namespace(decl),
            Node::None => Err(StreamError::new(StreamErrorKind::UnsupportedNode(NodeKind::None)).into()),
        }
    }

    /// Write the reader's current node.
    fn write_node(&mut self, reader: &dyn NodeReader) -> Result<(), Self::Error> {
        if reader.kind() == NodeKind::None {
            let err = StreamError::new(StreamErrorKind::UnsupportedNode(NodeKind::None))
                .with_line_info(reader.line_info());
            return Err(err.into());
        }
        self.write(reader.node().clone())
    }
}

/// Pump every remaining node of `reader` into `writer`.
///
/// Line positions are forwarded when the reader has them and the writer
/// records them. The writer is closed afterwards if `close_writer` is set.
pub fn transform<R, W>(reader: &mut R, writer: &mut W, close_writer: bool) -> Result<(), W::Error>
where
    R: NodeReader,
    W: NodeWriter + ?Sized,
{
    let accepts_lines = writer.accepts_line_info();
    let mut last_line: Option<LineInfo> = None;
    let mut count = 0usize;
    while reader.read()? {
        if accepts_lines
            && reader.has_line_info()
            && let Some(info) = reader.line_info()
            && last_line != Some(info)
        {
            writer.set_line_info(info)?;
            last_line = Some(info);
        }
        writer.write_node(&*reader)?;
        count += 1;
    }
    debug!(count, close_writer, "transformed node stream");
    if close_writer {
        writer.close()?;
    }
    Ok(())
}
