//! Text rendering of a node stream, one node per line.

use crate::{NodeReader, StreamError};
use loom_node::NodeKind;

/// Render the remaining nodes of `reader`, indented by nesting depth.
pub fn dump<R: NodeReader + ?Sized>(reader: &mut R) -> Result<String, StreamError> {
    let mut out = String::new();
    let mut depth = 0usize;
    while reader.read()? {
        let kind = reader.kind();
        if matches!(kind, NodeKind::EndObject | NodeKind::EndMember) {
            depth = depth.saturating_sub(1);
        }
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&reader.node().to_string());
        out.push('\n');
        if kind.opens_object() || kind == NodeKind::StartMember {
            depth += 1;
        }
    }
    Ok(out)
}
